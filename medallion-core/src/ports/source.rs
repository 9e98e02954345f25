// medallion-core/src/ports/source.rs

// Contract for reading a raw batch. The reader does not know what the columns mean:
// it returns an all-text table and leaves typing to the schema validator.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::project::SourceFormat;
use crate::domain::table::Table;
use crate::error::MedallionError;

#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read(&self, path: &Path, format: SourceFormat) -> Result<Table, MedallionError>;
}

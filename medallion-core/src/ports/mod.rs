// medallion-core/src/ports/mod.rs

pub mod connector;
pub mod source;
pub mod store;

pub use connector::{ColumnSchema, Connector, QueryResult};
pub use source::SourceReader;
pub use store::{LayerTable, TableStore};

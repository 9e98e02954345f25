// medallion-core/src/domain/mod.rs

pub mod error;
pub mod gold;
pub mod layer;
pub mod project;
pub mod quality;
pub mod query;
pub mod schema;
pub mod silver;
pub mod table;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
pub use layer::Layer;
pub use table::{ColumnType, Datasets, Field, Table, Value};

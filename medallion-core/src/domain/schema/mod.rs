// medallion-core/src/domain/schema/mod.rs

pub mod coercion;
pub mod descriptor;
pub mod registry;
pub mod validator;

pub use descriptor::{ColumnSpec, SchemaDescriptor};
pub use registry::{SchemaRegistry, datasets};
pub use validator::{SchemaValidator, SchemaWarning, ValidatedBatch, ValidationMode};

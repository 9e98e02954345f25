// medallion-core/src/domain/gold/mod.rs

pub mod assembler;
pub mod keys;
pub mod scd;

pub use assembler::{GoldAssembler, GoldHistory, GoldOutput, GoldSummary, fact_fields};
pub use keys::KeyAllocator;
pub use scd::{CustomerDimension, CustomerObservation, CustomerVersion, ScdChanges};

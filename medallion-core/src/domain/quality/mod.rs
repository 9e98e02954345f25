// medallion-core/src/domain/quality/mod.rs

pub mod check;
pub mod disposition;
pub mod firewall;
pub mod rules;

pub use check::{CheckStatus, OverallStatus, QualityCheckResult, QualityReport, QualitySummary};
pub use disposition::{Disposition, DispositionSet, RowAction};
pub use firewall::{FirewallOutcome, QualityFirewall};

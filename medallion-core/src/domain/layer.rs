// medallion-core/src/domain/layer.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Medallion layers, in data-flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Raw,
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub const DERIVED: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }

    /// Raw data is the source of truth and is never rebuilt or deleted.
    pub fn is_rebuildable(&self) -> bool {
        !matches!(self, Layer::Raw)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Layer::Raw),
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            other => Err(format!("unknown layer '{}'", other)),
        }
    }
}

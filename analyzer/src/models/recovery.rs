use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recovery strategy as requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStrategy {
    #[default]
    Auto,
    Interpolate,
    Reconstruct,
    Pattern,
    None,
}

/// A strategy with `auto` already decided; the only values the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedStrategy {
    Interpolate,
    Reconstruct,
    Pattern,
}

impl RecoveryStrategy {
    /// Picks a concrete strategy. `None` resolves to nothing; `Auto` goes by
    /// the share of rows lost.
    pub fn resolve(self, data_loss_percentage: f64) -> Option<ResolvedStrategy> {
        match self {
            Self::Auto if data_loss_percentage < 5.0 => Some(ResolvedStrategy::Interpolate),
            Self::Auto if data_loss_percentage < 20.0 => Some(ResolvedStrategy::Reconstruct),
            Self::Auto => Some(ResolvedStrategy::Pattern),
            Self::Interpolate => Some(ResolvedStrategy::Interpolate),
            Self::Reconstruct => Some(ResolvedStrategy::Reconstruct),
            Self::Pattern => Some(ResolvedStrategy::Pattern),
            Self::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Interpolate => "interpolate",
            Self::Reconstruct => "reconstruct",
            Self::Pattern => "pattern",
            Self::None => "none",
        }
    }
}

impl FromStr for RecoveryStrategy {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "interpolate" => Ok(Self::Interpolate),
            "reconstruct" => Ok(Self::Reconstruct),
            "pattern" => Ok(Self::Pattern),
            "none" => Ok(Self::None),
            other => Err(common::Error::InvalidInput(format!(
                "Unknown recovery strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResolvedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interpolate => "interpolate",
            Self::Reconstruct => "reconstruct",
            Self::Pattern => "pattern",
        }
    }
}

impl fmt::Display for ResolvedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDetail {
    pub index: usize,
    pub original_value: Option<String>,
    pub recovered_value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub strategy_used: ResolvedStrategy,
    pub total_recovered: usize,
    pub recovery_details: Vec<RecoveryDetail>,
    pub average_confidence: f64,
}

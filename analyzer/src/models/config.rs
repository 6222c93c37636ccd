use super::RecoveryStrategy;
use chrono::Duration;
use common::config::AnalysisSettings;
use common::Result;
use serde::{Deserialize, Serialize};

/// Immutable parameters threaded through every analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub time_threshold_minutes: i64,
    pub time_column: String,
    pub recovery_strategy: RecoveryStrategy,
    pub confidence_threshold: f64,
    pub max_invalid_examples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_threshold_minutes: 10,
            time_column: "TimeString".to_string(),
            recovery_strategy: RecoveryStrategy::Auto,
            confidence_threshold: 0.7,
            max_invalid_examples: 100,
        }
    }
}

impl AnalysisConfig {
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self> {
        if settings.time_threshold_minutes < 0
            || Duration::try_minutes(settings.time_threshold_minutes).is_none()
        {
            return Err(common::Error::InvalidInput(format!(
                "time_threshold_minutes must be a non-negative representable duration, got {}",
                settings.time_threshold_minutes
            )));
        }

        if !(0.0..=1.0).contains(&settings.confidence_threshold) {
            return Err(common::Error::InvalidInput(format!(
                "confidence_threshold must be within [0, 1], got {}",
                settings.confidence_threshold
            )));
        }

        Ok(Self {
            time_threshold_minutes: settings.time_threshold_minutes,
            time_column: settings.time_column.clone(),
            recovery_strategy: settings.recovery_strategy.parse()?,
            confidence_threshold: settings.confidence_threshold,
            max_invalid_examples: settings.max_invalid_examples,
        })
    }

    /// Saturates at the largest representable duration.
    pub fn gap_threshold(&self) -> Duration {
        Duration::try_minutes(self.time_threshold_minutes).unwrap_or(Duration::MAX)
    }

    pub fn with_time_column(mut self, column: &str) -> Self {
        self.time_column = column.to_string();
        self
    }

    pub fn with_threshold_minutes(mut self, minutes: i64) -> Self {
        self.time_threshold_minutes = minutes;
        self
    }
}

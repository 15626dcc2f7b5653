//! Configuration for forecasting and learning

use gridcast_learn::LearningConfig;
use gridcast_ledger::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Gridcast configuration, loaded from `config.json` with per-field defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Multiplier step-size schedule
    pub learning: LearningConfig,

    /// Most recent matching history days averaged into a baseline
    pub baseline_window_days: usize,

    /// Fewer matching days than this fails the prediction
    pub min_baseline_days: usize,

    /// Let a weekday without history use other days of its day type
    pub weekday_fallback: bool,

    /// Upper bound on a single context-provider call
    pub provider_timeout_ms: u64,

    /// Extra holidays: `MM-DD` (every year) or `YYYY-MM-DD` -> label
    pub holidays: BTreeMap<String, String>,

    /// Floor for the accuracy denominator
    pub accuracy_epsilon: f64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            learning: LearningConfig::default(),
            baseline_window_days: 28,
            min_baseline_days: 1,
            weekday_fallback: false,
            provider_timeout_ms: 2_000,
            holidays: BTreeMap::new(),
            accuracy_epsilon: 1e-9,
        }
    }

    /// Load from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| PersistenceError::io("read", path, e))?;
        let config: Config =
            serde_json::from_str(&contents).map_err(|source| PersistenceError::Corrupt {
                path: path.to_path_buf(),
                line: source.line(),
                source,
            })?;
        Ok(config)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.baseline_window_days, 28);
        assert_eq!(config.min_baseline_days, 1);
        assert!(!config.weekday_fallback);
        assert_eq!(config.provider_timeout(), Duration::from_secs(2));
        assert!(config.holidays.is_empty());
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Config::load(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"baseline_window_days": 7, "holidays": {"07-04": "independence_day"}, "learning": {"min_rate": 0.1}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.baseline_window_days, 7);
        assert_eq!(config.min_baseline_days, 1);
        assert_eq!(config.holidays["07-04"], "independence_day");
        assert_eq!(config.learning.min_rate, 0.1);
        assert_eq!(config.learning.initial_rate, 0.5);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{\n  \"baseline_window_days\": \"many\"\n}").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(PersistenceError::Corrupt { line: 2, .. })
        ));
    }
}

//! Path resolution for gridcast data files

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "GRIDCAST_HOME";

/// Resolves standard paths for the ledger, multiplier table and history
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve from `$GRIDCAST_HOME`, falling back to `~/.gridcast`
    pub fn new() -> std::io::Result<Self> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::at(PathBuf::from(dir)));
        }

        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;

        Ok(Self::at(home.join(".gridcast")))
    }

    /// Use an explicit data directory
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get insights.jsonl path
    pub fn insights_file(&self) -> PathBuf {
        self.data_dir.join("insights.jsonl")
    }

    /// Get multipliers.json path
    pub fn multipliers_file(&self) -> PathBuf {
        self.data_dir.join("multipliers.json")
    }

    /// Get history.jsonl path (hourly actuals)
    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.jsonl")
    }

    /// Get config.json path
    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

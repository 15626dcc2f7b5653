//! Factor learning system: owns the multiplier table and its update rule

use crate::factor::{
    FactorCategory, MultiplierEntry, MultiplierSnapshot, MultiplierTable, Resolved, DEFAULT_KEY,
};
use chrono::Utc;
use gridcast_ledger::{atomic_write, PersistenceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

const DEFAULT_INITIAL_RATE: f64 = 0.5;
const DEFAULT_MIN_RATE: f64 = 0.05;

#[derive(Debug, Error)]
pub enum LearnError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("corrupt multiplier table at {}:{line}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Overrides must be finite
    #[error("invalid multiplier {value} for {category} {key:?}")]
    InvalidValue {
        category: FactorCategory,
        key: String,
        value: f64,
    },
}

/// Step-size schedule for multiplier updates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Step size for the first observation of a key
    pub initial_rate: f64,
    /// Floor the step size never decays below
    pub min_rate: f64,
}

impl LearningConfig {
    /// Step size after `sample_count` observations; never increases with n
    pub fn rate(&self, sample_count: u64) -> f64 {
        (self.initial_rate / ((sample_count + 1) as f64).sqrt())
            .max(self.min_rate)
            .clamp(0.0, 1.0)
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            initial_rate: DEFAULT_INITIAL_RATE,
            min_rate: DEFAULT_MIN_RATE,
        }
    }
}

/// Result of a single `update` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierUpdate {
    pub category: FactorCategory,
    pub previous: f64,
    pub value: f64,
    pub sample_count: u64,
    /// The ratio or the resulting value hit the category bounds
    pub clamped: bool,
    /// False when the observation was discarded (non-finite input)
    pub applied: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTable {
    #[serde(default)]
    multipliers: MultiplierTable,
}

/// Learned multipliers keyed by `(category, key)`.
///
/// Reads share the lock; every mutation takes the write lock, persists the
/// whole table and only then swaps it in.
#[derive(Debug)]
pub struct FactorLearner {
    path: Option<PathBuf>,
    config: LearningConfig,
    table: RwLock<MultiplierTable>,
}

impl FactorLearner {
    /// Load (or lazily create) a JSON-backed multiplier table
    pub fn open(path: impl Into<PathBuf>, config: LearningConfig) -> Result<Self, LearnError> {
        let path = path.into();
        let table = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| PersistenceError::io("read", &path, e))?;
            let stored: StoredTable =
                serde_json::from_str(&contents).map_err(|source| LearnError::Corrupt {
                    path: path.clone(),
                    line: source.line(),
                    source,
                })?;
            stored.multipliers
        } else {
            MultiplierTable::new()
        };
        tracing::debug!(path = %path.display(), "loaded multiplier table");

        Ok(Self {
            path: Some(path),
            config,
            table: RwLock::new(table),
        })
    }

    pub fn in_memory(config: LearningConfig) -> Self {
        Self {
            path: None,
            config,
            table: RwLock::new(MultiplierTable::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Learned value for the pair, else the category default, else 1.0
    pub fn get_multiplier(&self, category: FactorCategory, key: &str) -> f64 {
        self.resolve(category, key).value
    }

    pub fn resolve(&self, category: FactorCategory, key: &str) -> Resolved {
        // Cheap enough for a four-category table; avoids exposing the guard.
        self.snapshot().resolve(category, key)
    }

    /// Read-only copy of the whole table for prediction and diagnostics
    pub fn snapshot(&self) -> MultiplierSnapshot {
        MultiplierSnapshot::from_table(self.read().clone())
    }

    /// Move `(category, key)` toward `observed_ratio`.
    ///
    /// `value += w * (ratio - value)` with `w = weight * rate(sample_count)`,
    /// so earlier observations move the value further than later ones. The
    /// ratio and the result are clamped to the category bounds.
    pub fn update(
        &self,
        category: FactorCategory,
        key: &str,
        observed_ratio: f64,
        weight: f64,
    ) -> Result<MultiplierUpdate, LearnError> {
        let mut guard = self.write();
        let current = Self::current_entry(&guard, category, key);

        if !observed_ratio.is_finite() || !weight.is_finite() {
            tracing::warn!(%category, key, observed_ratio, weight, "discarding non-finite observation");
            return Ok(MultiplierUpdate {
                category,
                previous: current.value,
                value: current.value,
                sample_count: current.sample_count,
                clamped: false,
                applied: false,
            });
        }

        let ratio = category.bound(observed_ratio);
        let step = (weight.clamp(0.0, 1.0) * self.config.rate(current.sample_count)).min(1.0);
        let raw = current.value + step * (ratio - current.value);
        let value = category.bound(raw);
        let clamped = ratio != observed_ratio || value != raw;
        if clamped {
            let (lo, hi) = category.bounds();
            tracing::warn!(%category, key, observed_ratio, lo, hi, "multiplier observation clamped");
        }

        let entry = MultiplierEntry {
            value,
            sample_count: current.sample_count + 1,
            updated_at: Some(Utc::now()),
        };
        let mut next = guard.clone();
        next.entry(category)
            .or_default()
            .insert(key.to_string(), entry.clone());
        self.commit(&mut guard, next)?;

        tracing::info!(
            %category,
            key,
            previous = current.value,
            value,
            samples = entry.sample_count,
            "multiplier updated"
        );
        Ok(MultiplierUpdate {
            category,
            previous: current.value,
            value,
            sample_count: entry.sample_count,
            clamped,
            applied: true,
        })
    }

    /// Administrative override; the value is clamped and the sample count kept.
    ///
    /// Non-finite values are rejected and leave the table untouched.
    pub fn set_multiplier(
        &self,
        category: FactorCategory,
        key: &str,
        value: f64,
    ) -> Result<f64, LearnError> {
        if !value.is_finite() {
            return Err(LearnError::InvalidValue {
                category,
                key: key.to_string(),
                value,
            });
        }
        let value = category.bound(value);
        let mut guard = self.write();
        let sample_count = guard
            .get(&category)
            .and_then(|m| m.get(key))
            .map(|e| e.sample_count)
            .unwrap_or(0);

        let mut next = guard.clone();
        next.entry(category).or_default().insert(
            key.to_string(),
            MultiplierEntry {
                value,
                sample_count,
                updated_at: Some(Utc::now()),
            },
        );
        self.commit(&mut guard, next)?;

        tracing::info!(%category, key, value, "multiplier overridden");
        Ok(value)
    }

    /// Drop learned entries for one category, or all of them
    pub fn reset(&self, category: Option<FactorCategory>) -> Result<usize, LearnError> {
        let mut guard = self.write();
        let mut next = guard.clone();
        let removed = match category {
            Some(c) => next.remove(&c).map(|m| m.len()).unwrap_or(0),
            None => {
                let n = next.values().map(|m| m.len()).sum();
                next.clear();
                n
            }
        };
        if removed > 0 {
            self.commit(&mut guard, next)?;
        }

        tracing::info!(category = ?category, removed, "multipliers reset");
        Ok(removed)
    }

    /// An unseen key starts from whatever the predictor would have used for it
    fn current_entry(table: &MultiplierTable, category: FactorCategory, key: &str) -> MultiplierEntry {
        let entries = table.get(&category);
        if let Some(entry) = entries.and_then(|m| m.get(key)) {
            return entry.clone();
        }
        let seed = entries
            .and_then(|m| m.get(DEFAULT_KEY))
            .map(|e| e.value)
            .unwrap_or(crate::factor::NEUTRAL);
        MultiplierEntry::new(seed)
    }

    fn commit(
        &self,
        guard: &mut RwLockWriteGuard<'_, MultiplierTable>,
        next: MultiplierTable,
    ) -> Result<(), LearnError> {
        if let Some(ref path) = self.path {
            let stored = StoredTable { multipliers: next };
            let json = serde_json::to_string_pretty(&stored).map_err(PersistenceError::from)?;
            atomic_write(path, json.as_bytes())?;
            **guard = stored.multipliers;
        } else {
            **guard = next;
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, MultiplierTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MultiplierTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FactorLearner {
    fn default() -> Self {
        Self::in_memory(LearningConfig::default())
    }
}

//! Factor categories, multiplier entries and read-only snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fallback key consulted when a specific key has never been learned
pub const DEFAULT_KEY: &str = "default";

/// Neutral multiplier: no adjustment
pub const NEUTRAL: f64 = 1.0;

/// Closed set of correction factors the predictor applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    Season,
    Weather,
    Holiday,
    #[serde(rename = "combined_mult")]
    Combined,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 4] = [
        FactorCategory::Season,
        FactorCategory::Weather,
        FactorCategory::Holiday,
        FactorCategory::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorCategory::Season => "season",
            FactorCategory::Weather => "weather",
            FactorCategory::Holiday => "holiday",
            FactorCategory::Combined => "combined_mult",
        }
    }

    /// Inclusive clamp range for learned values and observed ratios
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            FactorCategory::Season | FactorCategory::Weather | FactorCategory::Holiday => {
                (0.1, 3.0)
            }
            // Catch-all correction stays tighter than any single factor
            FactorCategory::Combined => (0.5, 2.0),
        }
    }

    pub fn bound(&self, value: f64) -> f64 {
        let (lo, hi) = self.bounds();
        value.clamp(lo, hi)
    }
}

impl fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "season" => Ok(FactorCategory::Season),
            "weather" => Ok(FactorCategory::Weather),
            "holiday" => Ok(FactorCategory::Holiday),
            "combined_mult" | "combined" => Ok(FactorCategory::Combined),
            other => Err(format!("unknown factor category: {other}")),
        }
    }
}

/// One learned multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplierEntry {
    pub value: f64,
    #[serde(default)]
    pub sample_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MultiplierEntry {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            sample_count: 0,
            updated_at: None,
        }
    }

    /// Grows toward 1.0 with the number of observations
    pub fn confidence(&self) -> f64 {
        let n = self.sample_count as f64;
        n / (n + 5.0)
    }
}

pub(crate) type MultiplierTable = BTreeMap<FactorCategory, BTreeMap<String, MultiplierEntry>>;

/// Where a resolved multiplier came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiplierSource {
    /// The exact `(category, key)` pair has been learned or set
    Learned { sample_count: u64 },
    /// Fell back to the category's `default` key
    CategoryDefault { sample_count: u64 },
    /// Nothing learned; neutral 1.0
    Neutral,
}

/// A resolved multiplier value plus its provenance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub source: MultiplierSource,
}

/// Read-only copy of the multiplier table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiplierSnapshot {
    multipliers: MultiplierTable,
}

impl MultiplierSnapshot {
    pub(crate) fn from_table(multipliers: MultiplierTable) -> Self {
        Self { multipliers }
    }

    /// Resolve `(category, key)`, falling back to the category default, then 1.0
    pub fn resolve(&self, category: FactorCategory, key: &str) -> Resolved {
        let entries = self.multipliers.get(&category);
        if let Some(entry) = entries.and_then(|m| m.get(key)) {
            return Resolved {
                value: entry.value,
                source: MultiplierSource::Learned {
                    sample_count: entry.sample_count,
                },
            };
        }
        if let Some(entry) = entries.and_then(|m| m.get(DEFAULT_KEY)) {
            return Resolved {
                value: entry.value,
                source: MultiplierSource::CategoryDefault {
                    sample_count: entry.sample_count,
                },
            };
        }
        Resolved {
            value: NEUTRAL,
            source: MultiplierSource::Neutral,
        }
    }

    pub fn get(&self, category: FactorCategory, key: &str) -> f64 {
        self.resolve(category, key).value
    }

    pub fn entry(&self, category: FactorCategory, key: &str) -> Option<&MultiplierEntry> {
        self.multipliers.get(&category).and_then(|m| m.get(key))
    }

    /// Every stored entry, ordered by category then key
    pub fn iter(&self) -> impl Iterator<Item = (FactorCategory, &str, &MultiplierEntry)> {
        self.multipliers.iter().flat_map(|(category, entries)| {
            entries
                .iter()
                .map(move |(key, entry)| (*category, key.as_str(), entry))
        })
    }

    pub fn len(&self) -> usize {
        self.multipliers.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

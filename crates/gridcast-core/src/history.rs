//! Historical hourly actuals used for baselines and verification

use crate::error::ForecastError;
use crate::types::HOURS;
use chrono::NaiveDate;
use gridcast_ledger::{atomic_write, encode_jsonl, read_jsonl_lenient};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Observed hourly values for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub hourly: Vec<f64>,
}

impl HistoryDay {
    pub fn new(date: NaiveDate, hourly: Vec<f64>) -> Self {
        Self { date, hourly }
    }

    /// Same value in every hour
    pub fn flat(date: NaiveDate, value: f64) -> Self {
        Self::new(date, vec![value; HOURS])
    }

    pub fn total(&self) -> f64 {
        self.hourly.iter().sum()
    }

    /// Exactly 24 finite, non-negative values
    pub fn is_valid(&self) -> bool {
        self.hourly.len() == HOURS && self.hourly.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Read-only source of past actuals
pub trait HistorySource: Send + Sync {
    /// Valid days strictly before `date`, oldest first
    fn days_before(&self, date: NaiveDate) -> Result<Vec<HistoryDay>, ForecastError>;

    /// The recorded day, if any
    fn day(&self, date: NaiveDate) -> Result<Option<HistoryDay>, ForecastError>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    days: RwLock<BTreeMap<NaiveDate, HistoryDay>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_days(days: impl IntoIterator<Item = HistoryDay>) -> Self {
        let history = Self::new();
        for day in days {
            history.insert(day);
        }
        history
    }

    /// Insert or replace a day; invalid days are ignored
    pub fn insert(&self, day: HistoryDay) -> bool {
        if !day.is_valid() {
            tracing::warn!(date = %day.date, "ignoring history day without 24 valid hours");
            return false;
        }
        self.days
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(day.date, day);
        true
    }
}

impl HistorySource for InMemoryHistory {
    fn days_before(&self, date: NaiveDate) -> Result<Vec<HistoryDay>, ForecastError> {
        let days = self.days.read().unwrap_or_else(|e| e.into_inner());
        Ok(days.range(..date).map(|(_, d)| d.clone()).collect())
    }

    fn day(&self, date: NaiveDate) -> Result<Option<HistoryDay>, ForecastError> {
        let days = self.days.read().unwrap_or_else(|e| e.into_inner());
        Ok(days.get(&date).cloned())
    }
}

/// History stored as one `{"date", "hourly"}` object per line.
///
/// Re-read on every call so that actuals recorded by other processes are
/// picked up. Later lines win when a date repeats.
#[derive(Debug, Clone)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<NaiveDate, HistoryDay>, ForecastError> {
        let records: Vec<HistoryDay> = read_jsonl_lenient(&self.path)?;
        let mut days = BTreeMap::new();
        for day in records {
            if !day.is_valid() {
                tracing::warn!(date = %day.date, path = %self.path.display(), "skipping history day without 24 valid hours");
                continue;
            }
            days.insert(day.date, day);
        }
        Ok(days)
    }

    /// Record (or replace) observed actuals for a day
    pub fn record(&self, day: HistoryDay) -> Result<(), ForecastError> {
        if !day.is_valid() {
            return Err(ForecastError::InvalidActual {
                for_date: crate::types::format_date(day.date),
                value: day.total(),
            });
        }
        let mut days = self.load()?;
        tracing::info!(date = %day.date, total = day.total(), "recorded actuals");
        days.insert(day.date, day);
        let records: Vec<HistoryDay> = days.into_values().collect();
        atomic_write(&self.path, &encode_jsonl(&records)?)?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, ForecastError> {
        Ok(self.load()?.len())
    }

    /// First and last recorded dates
    pub fn span(&self) -> Result<Option<(NaiveDate, NaiveDate)>, ForecastError> {
        let days = self.load()?;
        Ok(days
            .keys()
            .next()
            .copied()
            .zip(days.keys().next_back().copied()))
    }
}

impl HistorySource for JsonlHistory {
    fn days_before(&self, date: NaiveDate) -> Result<Vec<HistoryDay>, ForecastError> {
        Ok(self.load()?.range(..date).map(|(_, d)| d.clone()).collect())
    }

    fn day(&self, date: NaiveDate) -> Result<Option<HistoryDay>, ForecastError> {
        Ok(self.load()?.remove(&date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_validity() {
        assert!(HistoryDay::flat(date("2025-01-01"), 1.0).is_valid());
        assert!(!HistoryDay::new(date("2025-01-01"), vec![1.0; 23]).is_valid());
        let mut bad = HistoryDay::flat(date("2025-01-01"), 1.0);
        bad.hourly[3] = f64::NAN;
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_in_memory_days_before_is_strict_and_ordered() {
        let history = InMemoryHistory::with_days([
            HistoryDay::flat(date("2025-01-03"), 3.0),
            HistoryDay::flat(date("2025-01-01"), 1.0),
            HistoryDay::flat(date("2025-01-02"), 2.0),
        ]);
        let before = history.days_before(date("2025-01-03")).unwrap();
        let dates: Vec<_> = before.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date("2025-01-01"), date("2025-01-02")]);
        assert_eq!(history.day(date("2025-01-03")).unwrap().unwrap().total(), 72.0);
    }

    #[test]
    fn test_in_memory_rejects_invalid() {
        let history = InMemoryHistory::new();
        assert!(!history.insert(HistoryDay::new(date("2025-01-01"), vec![1.0])));
        assert!(history.day(date("2025-01-01")).unwrap().is_none());
    }

    #[test]
    fn test_jsonl_record_and_read() {
        let temp = tempfile::TempDir::new().unwrap();
        let history = JsonlHistory::new(temp.path().join("history.jsonl"));
        history.record(HistoryDay::flat(date("2025-01-02"), 2.0)).unwrap();
        history.record(HistoryDay::flat(date("2025-01-01"), 1.0)).unwrap();
        history.record(HistoryDay::flat(date("2025-01-02"), 5.0)).unwrap();

        assert_eq!(history.len().unwrap(), 2);
        assert_eq!(
            history.span().unwrap(),
            Some((date("2025-01-01"), date("2025-01-02")))
        );
        assert_eq!(history.day(date("2025-01-02")).unwrap().unwrap().hourly[0], 5.0);
        assert!(history.record(HistoryDay::new(date("2025-01-03"), vec![])).is_err());
    }

    #[test]
    fn test_jsonl_skips_bad_lines() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("history.jsonl");
        let good = serde_json::to_string(&HistoryDay::flat(date("2025-01-01"), 1.0)).unwrap();
        std::fs::write(
            &path,
            format!("{good}\nnot json\n{{\"date\":\"2025-01-02\",\"hourly\":[1,2]}}\n"),
        )
        .unwrap();

        let history = JsonlHistory::new(&path);
        assert_eq!(history.days_before(date("2025-02-01")).unwrap().len(), 1);
    }
}

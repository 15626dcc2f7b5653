//! Context providers: weather labels and the holiday calendar

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Label providers return this (or nothing) when they cannot classify a date
pub const UNKNOWN_LABEL: &str = "unknown";

/// Read-only collaborator that labels dates (weather regime, holiday name)
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Label for `date`; `None` or `"unknown"` means no signal
    fn label(&self, date: NaiveDate) -> anyhow::Result<Option<String>>;

    /// Labels for many dates in one call
    fn labels(&self, dates: &[NaiveDate]) -> anyhow::Result<BTreeMap<NaiveDate, Option<String>>> {
        dates
            .iter()
            .map(|&d| Ok((d, self.label(d)?)))
            .collect()
    }
}

/// Lowercase, underscore-separated; empty and `unknown` become `None`
pub fn normalize_label(raw: Option<&str>) -> Option<String> {
    let label = raw?.trim().to_lowercase().replace([' ', '-'], "_");
    if label.is_empty() || label == UNKNOWN_LABEL {
        None
    } else {
        Some(label)
    }
}

/// Call `provider` for one date on a helper thread, giving up after `timeout`.
///
/// Errors and timeouts degrade to `None`.
pub fn resolve_label(
    provider: &Arc<dyn ContextProvider>,
    date: NaiveDate,
    timeout: Duration,
) -> Option<String> {
    resolve_labels(provider, &[date], timeout)
        .remove(&date)
        .flatten()
}

/// Batch form of [`resolve_label`]; on failure every date maps to `None`
pub fn resolve_labels(
    provider: &Arc<dyn ContextProvider>,
    dates: &[NaiveDate],
    timeout: Duration,
) -> BTreeMap<NaiveDate, Option<String>> {
    let neutral = || -> BTreeMap<NaiveDate, Option<String>> {
        dates.iter().map(|&d| (d, None)).collect()
    };
    if dates.is_empty() {
        return BTreeMap::new();
    }

    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(provider);
    let owned: Vec<NaiveDate> = dates.to_vec();
    let spawned = std::thread::Builder::new()
        .name(format!("ctx-{}", provider.name()))
        .spawn(move || {
            let _ = tx.send(worker.labels(&owned));
        });
    if let Err(e) = spawned {
        tracing::warn!(provider = provider.name(), error = %e, "could not start provider call");
        return neutral();
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(labels)) => dates
            .iter()
            .map(|d| {
                let label = labels.get(d).and_then(|l| normalize_label(l.as_deref()));
                (*d, label)
            })
            .collect(),
        Ok(Err(e)) => {
            tracing::warn!(provider = provider.name(), error = %e, "context provider failed, using neutral labels");
            neutral()
        }
        Err(_) => {
            tracing::warn!(provider = provider.name(), timeout_ms = timeout.as_millis() as u64, "context provider timed out, using neutral labels");
            neutral()
        }
    }
}

/// Fixed weather labels per date (manual entries or imported observations)
#[derive(Debug, Clone, Default)]
pub struct StaticWeather {
    labels: BTreeMap<NaiveDate, String>,
}

impl StaticWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, date: NaiveDate, label: &str) -> Self {
        self.labels.insert(date, label.to_string());
        self
    }
}

impl ContextProvider for StaticWeather {
    fn name(&self) -> &str {
        "weather"
    }

    fn label(&self, date: NaiveDate) -> anyhow::Result<Option<String>> {
        Ok(self.labels.get(&date).cloned())
    }
}

/// Recurring (month, day) and one-off holidays
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    recurring: BTreeMap<(u32, u32), String>,
    dated: BTreeMap<NaiveDate, String>,
}

impl HolidayCalendar {
    /// No holidays at all
    pub fn empty() -> Self {
        Self {
            recurring: BTreeMap::new(),
            dated: BTreeMap::new(),
        }
    }

    /// Built-in fixed-date holidays
    pub fn new() -> Self {
        let mut calendar = Self::empty();
        for (month, day, label) in [
            (1, 1, "new_years_day"),
            (12, 24, "christmas_eve"),
            (12, 25, "christmas"),
            (12, 31, "new_years_eve"),
        ] {
            calendar.recurring.insert((month, day), label.to_string());
        }
        calendar
    }

    /// Built-ins plus configured `MM-DD` / `YYYY-MM-DD` entries.
    ///
    /// Unparseable keys are skipped with a warning.
    pub fn from_config(extra: &BTreeMap<String, String>) -> Self {
        let mut calendar = Self::new();
        for (key, label) in extra {
            let Some(label) = normalize_label(Some(label)) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
                calendar.dated.insert(date, label);
                continue;
            }
            // Leap year so that 02-29 validates.
            match NaiveDate::parse_from_str(&format!("2000-{key}"), "%Y-%m-%d") {
                Ok(d) if key.len() == 5 => {
                    calendar.recurring.insert((d.month(), d.day()), label);
                }
                _ => tracing::warn!(key = %key, "ignoring unparseable holiday key"),
            }
        }
        calendar
    }

    pub fn holiday(&self, date: NaiveDate) -> Option<&str> {
        self.dated
            .get(&date)
            .or_else(|| self.recurring.get(&(date.month(), date.day())))
            .map(String::as_str)
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for HolidayCalendar {
    fn name(&self) -> &str {
        "holidays"
    }

    fn label(&self, date: NaiveDate) -> anyhow::Result<Option<String>> {
        Ok(self.holiday(date).map(str::to_string))
    }
}

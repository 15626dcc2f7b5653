//! Calendar buckets, forecast context and prediction output

use crate::error::ForecastError;
use chrono::{Datelike, NaiveDate, Weekday};
use gridcast_learn::{FactorCategory, DEFAULT_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hourly slots per forecast day
pub const HOURS: usize = 24;

/// Holiday label for ordinary days
pub const NO_HOLIDAY: &str = "none";

/// Key of the catch-all correction multiplier
pub const COMBINED_KEY: &str = "total";

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2200;

/// Parse a canonical `YYYY-MM-DD` date
pub fn parse_date(input: &str) -> Result<NaiveDate, ForecastError> {
    let invalid = |reason: &str| ForecastError::InvalidDate {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(invalid("expected YYYY-MM-DD"));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| invalid(&e.to_string()))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(invalid("year out of range"));
    }
    Ok(date)
}

/// Canonical `YYYY-MM-DD` form used for `forDate`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological seasons (northern hemisphere)
    pub fn from_date(date: NaiveDate) -> Self {
        match date.month() {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied signals for a prediction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictContext {
    /// Weather label; overrides the weather provider when set
    pub weather: Option<String>,
}

impl PredictContext {
    pub fn weather(label: impl Into<String>) -> Self {
        Self {
            weather: Some(label.into()),
        }
    }
}

/// Season, day type, weather and holiday labels for one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastContext {
    pub season: Season,
    pub day_type: DayType,
    pub weather: String,
    pub holiday: String,
}

impl ForecastContext {
    pub fn is_holiday(&self) -> bool {
        self.holiday != NO_HOLIDAY
    }

    /// `(category, key)` for every multiplier applied to this context
    pub fn factor_keys(&self) -> [(FactorCategory, String); 4] {
        [
            (FactorCategory::Season, self.season.as_str().to_string()),
            (FactorCategory::Weather, self.weather.clone()),
            (FactorCategory::Holiday, self.holiday.clone()),
            (FactorCategory::Combined, COMBINED_KEY.to_string()),
        ]
    }
}

impl Default for ForecastContext {
    fn default() -> Self {
        Self {
            season: Season::Winter,
            day_type: DayType::Weekday,
            weather: DEFAULT_KEY.to_string(),
            holiday: NO_HOLIDAY.to_string(),
        }
    }
}

/// How much one multiplier contributed, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub value: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub hour: u8,
    pub baseline: f64,
    pub adjusted: f64,
    /// Factor name (category) to contribution
    pub factors: BTreeMap<String, FactorContribution>,
}

/// One multiplier as applied by a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFactor {
    pub category: FactorCategory,
    pub key: String,
    pub value: f64,
}

/// A complete 24-hour forecast for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub date: NaiveDate,
    pub context: ForecastContext,
    pub hours: Vec<HourlyForecast>,
    pub factors: Vec<AppliedFactor>,
    /// Daily sum of the baseline pattern
    pub baseline_total: f64,
    /// Daily sum of the adjusted forecast
    pub total: f64,
    /// Product of every applied multiplier
    pub combined_multiplier: f64,
    /// History days averaged into the baseline
    pub baseline_days: usize,
}

impl Prediction {
    pub fn hourly_values(&self) -> Vec<f64> {
        self.hours.iter().map(|h| h.adjusted).collect()
    }
}

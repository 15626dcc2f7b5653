//! Forecasting and verification errors

use crate::types::Season;
use chrono::{NaiveDate, Weekday};
use gridcast_learn::LearnError;
use gridcast_ledger::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed or out-of-range date input
    #[error("invalid date {input:?}: {reason}")]
    InvalidDate { input: String, reason: String },

    /// Not enough same-context history to build a baseline
    #[error(
        "no history for {date} ({season} {weekday}, holiday={holiday}): found {found} matching days"
    )]
    NoHistory {
        date: NaiveDate,
        season: Season,
        weekday: Weekday,
        holiday: bool,
        found: usize,
    },

    /// Verification requested for a date that was never predicted
    #[error("no stored prediction for {for_date}")]
    MissingPrediction { for_date: String },

    /// Verification from history requested before actuals were recorded
    #[error("no observed actuals for {for_date}")]
    MissingActuals { for_date: String },

    #[error("invalid actual value for {for_date}: {value}")]
    InvalidActual { for_date: String, value: f64 },

    /// A stored insight does not decode as its declared kind
    #[error("insight {id} has malformed details: {source}")]
    MalformedInsight {
        id: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Learning(#[from] LearnError),
}

//! Hourly forecasting: baselines, context multipliers and verification

mod config;
mod context;
mod error;
mod history;
mod predictor;
mod types;
mod verify;

pub use config::Config;
pub use context::{
    normalize_label, resolve_label, resolve_labels, ContextProvider, HolidayCalendar,
    StaticWeather, UNKNOWN_LABEL,
};
pub use error::ForecastError;
pub use history::{HistoryDay, HistorySource, InMemoryHistory, JsonlHistory};
pub use predictor::{AdvancedPredictor, Baseline, PredictionDetails};
pub use types::{
    format_date, parse_date, AppliedFactor, DayType, FactorContribution, ForecastContext,
    HourlyForecast, PredictContext, Prediction, Season, COMBINED_KEY, HOURS, NO_HOLIDAY,
};
pub use verify::{
    accuracy, attribute, PlannedUpdate, VerificationDetails, VerificationJob,
    VerificationOutcome, VerificationStatus,
};

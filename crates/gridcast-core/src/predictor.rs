//! Advanced predictor: same-context baseline times learned multipliers

use crate::config::Config;
use crate::context::{resolve_label, resolve_labels, ContextProvider, HolidayCalendar};
use crate::error::ForecastError;
use crate::history::{HistoryDay, HistorySource};
use crate::types::{
    format_date, parse_date, AppliedFactor, DayType, FactorContribution, ForecastContext,
    HourlyForecast, PredictContext, Prediction, Season, COMBINED_KEY, HOURS, NO_HOLIDAY,
};
use chrono::{Datelike, NaiveDate};
use gridcast_learn::{
    FactorCategory, FactorLearner, MultiplierSnapshot, MultiplierSource, Resolved, DEFAULT_KEY,
};
use gridcast_ledger::{Insight, InsightKind, InsightLedger, NewInsight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload of a `prediction` insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDetails {
    pub for_date: String,
    /// Daily total of the adjusted forecast
    pub predicted: f64,
    pub hourly: Vec<f64>,
    /// Daily total of the baseline
    pub baseline: f64,
    pub baseline_days: usize,
    pub context: ForecastContext,
    pub factors: Vec<AppliedFactor>,
}

impl From<&Prediction> for PredictionDetails {
    fn from(p: &Prediction) -> Self {
        Self {
            for_date: format_date(p.date),
            predicted: p.total,
            hourly: p.hourly_values(),
            baseline: p.baseline_total,
            baseline_days: p.baseline_days,
            context: p.context.clone(),
            factors: p.factors.clone(),
        }
    }
}

/// Hourly baseline averaged from matching history days
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub hourly: Vec<f64>,
    pub days: usize,
    /// A holiday date fell back to ordinary days of the same bucket
    pub relaxed: bool,
    /// No history for the weekday; days of the same day type were used
    pub weekday_relaxed: bool,
}

pub struct AdvancedPredictor {
    config: Config,
    history: Arc<dyn HistorySource>,
    learner: Arc<FactorLearner>,
    weather: Option<Arc<dyn ContextProvider>>,
    holidays: Arc<dyn ContextProvider>,
}

impl AdvancedPredictor {
    pub fn new(config: Config, history: Arc<dyn HistorySource>, learner: Arc<FactorLearner>) -> Self {
        let holidays: Arc<dyn ContextProvider> = Arc::new(HolidayCalendar::from_config(&config.holidays));
        Self {
            config,
            history,
            learner,
            weather: None,
            holidays,
        }
    }

    pub fn with_weather(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn with_holidays(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.holidays = provider;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse `date` and predict
    pub fn predict_str(
        &self,
        date: &str,
        context: Option<&PredictContext>,
    ) -> Result<Prediction, ForecastError> {
        self.predict(parse_date(date)?, context)
    }

    /// Forecast 24 hourly values for `date`.
    ///
    /// Either a complete prediction or an error; never a partial forecast.
    pub fn predict(
        &self,
        date: NaiveDate,
        context: Option<&PredictContext>,
    ) -> Result<Prediction, ForecastError> {
        let ctx = self.context_for(date, context);
        let baseline = self.baseline(date, &ctx)?;

        // One snapshot per call: every hour sees the same table.
        let snapshot = self.learner.snapshot();
        let resolved: Vec<(FactorCategory, String, Resolved)> = ctx
            .factor_keys()
            .into_iter()
            .map(|(category, key)| {
                let r = snapshot.resolve(category, &key);
                (category, key, r)
            })
            .collect();

        let combined: f64 = resolved.iter().map(|(_, _, r)| r.value).product();
        let mut breakdown = BTreeMap::new();
        for (category, key, r) in &resolved {
            breakdown.insert(
                category.as_str().to_string(),
                FactorContribution {
                    value: r.value,
                    description: describe(*category, key, r, &baseline),
                },
            );
        }

        let hours: Vec<HourlyForecast> = baseline
            .hourly
            .iter()
            .enumerate()
            .map(|(hour, &base)| HourlyForecast {
                hour: hour as u8,
                baseline: base,
                adjusted: base * combined,
                factors: breakdown.clone(),
            })
            .collect();

        let prediction = Prediction {
            date,
            baseline_total: baseline.hourly.iter().sum(),
            total: hours.iter().map(|h| h.adjusted).sum(),
            combined_multiplier: combined,
            baseline_days: baseline.days,
            factors: resolved
                .into_iter()
                .map(|(category, key, r)| AppliedFactor {
                    category,
                    key,
                    value: r.value,
                })
                .collect(),
            context: ctx,
            hours,
        };

        tracing::debug!(
            date = %prediction.date,
            season = %prediction.context.season,
            weather = %prediction.context.weather,
            holiday = %prediction.context.holiday,
            baseline_days = prediction.baseline_days,
            combined = prediction.combined_multiplier,
            total = prediction.total,
            "prediction computed"
        );
        Ok(prediction)
    }

    /// Season, day type, weather and holiday labels for `date`
    pub fn context_for(&self, date: NaiveDate, context: Option<&PredictContext>) -> ForecastContext {
        let timeout = self.config.provider_timeout();

        let explicit = context
            .and_then(|c| c.weather.as_deref())
            .and_then(|w| crate::context::normalize_label(Some(w)));
        let weather = explicit
            .or_else(|| {
                self.weather
                    .as_ref()
                    .and_then(|p| resolve_label(p, date, timeout))
            })
            .unwrap_or_else(|| DEFAULT_KEY.to_string());

        let holiday = resolve_label(&self.holidays, date, timeout)
            .unwrap_or_else(|| NO_HOLIDAY.to_string());

        ForecastContext {
            season: Season::from_date(date),
            day_type: DayType::from_date(date),
            weather,
            holiday,
        }
    }

    /// Average the most recent same-bucket history days before `date`.
    ///
    /// The bucket is the season and the day of the week. With
    /// `weekday_fallback` set, a weekday with no history of its own borrows
    /// the other days of its day type and the baseline is marked relaxed.
    pub fn baseline(&self, date: NaiveDate, ctx: &ForecastContext) -> Result<Baseline, ForecastError> {
        let weekday = date.weekday();
        let same_season: Vec<HistoryDay> = self
            .history
            .days_before(date)?
            .into_iter()
            .rev()
            .filter(|d| d.is_valid() && Season::from_date(d.date) == ctx.season)
            .collect();

        let mut candidates: Vec<&HistoryDay> = same_season
            .iter()
            .filter(|d| d.date.weekday() == weekday)
            .collect();
        let mut weekday_relaxed = false;
        if candidates.is_empty() && self.config.weekday_fallback {
            candidates = same_season
                .iter()
                .filter(|d| DayType::from_date(d.date) == ctx.day_type)
                .collect();
            weekday_relaxed = !candidates.is_empty();
            if weekday_relaxed {
                tracing::debug!(%date, ?weekday, day_type = %ctx.day_type, "no history for this weekday, using its day type");
            }
        }

        let dates: Vec<NaiveDate> = candidates.iter().map(|d| d.date).collect();
        let labels = resolve_labels(&self.holidays, &dates, self.config.provider_timeout());
        let is_holiday = |d: &HistoryDay| labels.get(&d.date).map_or(false, |l| l.is_some());

        let window = self.config.baseline_window_days.max(1);
        let mut chosen: Vec<&HistoryDay> = candidates
            .iter()
            .copied()
            .filter(|d| is_holiday(d) == ctx.is_holiday())
            .take(window)
            .collect();

        let mut relaxed = false;
        if chosen.is_empty() && ctx.is_holiday() {
            // Holidays are rare; use ordinary days and let the holiday factor correct.
            chosen = candidates
                .iter()
                .copied()
                .filter(|d| !is_holiday(d))
                .take(window)
                .collect();
            relaxed = !chosen.is_empty();
            if relaxed {
                tracing::debug!(%date, holiday = %ctx.holiday, "no holiday history, using ordinary days");
            }
        }

        if chosen.is_empty() || chosen.len() < self.config.min_baseline_days {
            return Err(ForecastError::NoHistory {
                date,
                season: ctx.season,
                weekday,
                holiday: ctx.is_holiday(),
                found: chosen.len(),
            });
        }

        let n = chosen.len() as f64;
        let hourly = (0..HOURS)
            .map(|h| chosen.iter().map(|d| d.hourly[h]).sum::<f64>() / n)
            .collect();

        Ok(Baseline {
            hourly,
            days: chosen.len(),
            relaxed,
            weekday_relaxed,
        })
    }

    pub fn snapshot(&self) -> MultiplierSnapshot {
        self.learner.snapshot()
    }

    pub fn season_multiplier(&self, date: NaiveDate) -> f64 {
        self.learner
            .get_multiplier(FactorCategory::Season, Season::from_date(date).as_str())
    }

    pub fn weather_multiplier(&self, label: &str) -> f64 {
        let key = crate::context::normalize_label(Some(label)).unwrap_or_else(|| DEFAULT_KEY.to_string());
        self.learner.get_multiplier(FactorCategory::Weather, &key)
    }

    pub fn holiday_multiplier(&self, date: NaiveDate) -> f64 {
        let label = resolve_label(&self.holidays, date, self.config.provider_timeout())
            .unwrap_or_else(|| NO_HOLIDAY.to_string());
        self.learner.get_multiplier(FactorCategory::Holiday, &label)
    }

    pub fn combined_multiplier(&self) -> f64 {
        self.learner
            .get_multiplier(FactorCategory::Combined, COMBINED_KEY)
    }

    /// Persist `prediction` as a `prediction` insight for later verification
    pub fn record(
        &self,
        prediction: &Prediction,
        ledger: &InsightLedger,
    ) -> Result<Insight, ForecastError> {
        let details = PredictionDetails::from(prediction);
        let new = NewInsight::new(InsightKind::Prediction, &details)
            .map_err(gridcast_ledger::PersistenceError::from)?;
        let insight = ledger.append(new)?;
        tracing::info!(id = insight.id, for_date = %details.for_date, predicted = details.predicted, "prediction recorded");
        Ok(insight)
    }
}

fn describe(category: FactorCategory, key: &str, resolved: &Resolved, baseline: &Baseline) -> String {
    let origin = match resolved.source {
        MultiplierSource::Learned { sample_count: 0 } => "set manually".to_string(),
        MultiplierSource::Learned { sample_count } => {
            format!("learned from {sample_count} verifications")
        }
        MultiplierSource::CategoryDefault { .. } => format!("no data for {key:?}, {category} default"),
        MultiplierSource::Neutral => "no data, neutral".to_string(),
    };
    let mut text = format!("{category} {key}: x{:.3} ({origin})", resolved.value);
    if baseline.relaxed && category == FactorCategory::Holiday {
        text.push_str("; baseline from ordinary days");
    }
    if baseline.weekday_relaxed && category == FactorCategory::Season {
        text.push_str("; baseline from other days of the same day type");
    }
    text
}

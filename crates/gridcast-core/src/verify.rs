//! Verification job: compare a stored prediction with actuals and relearn

use crate::error::ForecastError;
use crate::history::HistorySource;
use crate::predictor::PredictionDetails;
use crate::types::{format_date, AppliedFactor, ForecastContext};
use chrono::NaiveDate;
use gridcast_learn::{FactorCategory, FactorLearner, MultiplierUpdate};
use gridcast_ledger::{
    latest_in, Committed, Insight, InsightKind, InsightLedger, NewInsight, PersistenceError,
    Transaction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bounds on `actual / predicted` before it is split across factors
const RATIO_BOUNDS: (f64, f64) = (0.1, 3.0);

/// Tolerance when deciding whether a re-run repeats an earlier verification
const SAME_VALUE_TOLERANCE: f64 = 1e-9;

/// Agreement between predicted and actual, in `[0, 1]`.
///
/// `1 - |actual - predicted| / max(actual, predicted, epsilon)`
pub fn accuracy(predicted: f64, actual: f64, epsilon: f64) -> f64 {
    let denom = actual.max(predicted).max(epsilon);
    (1.0 - (actual - predicted).abs() / denom).clamp(0.0, 1.0)
}

/// Per-factor learning targets for one verification.
///
/// The overall ratio `R = actual / predicted` is split evenly in log space:
/// each of the `k` factors is asked to move to `m_i * R^(1/k)`, so applying
/// every target at once reproduces `R`.
pub fn attribute(factors: &[AppliedFactor], predicted: f64, actual: f64) -> Vec<PlannedUpdate> {
    if factors.is_empty() || predicted <= 0.0 || !predicted.is_finite() || !actual.is_finite() {
        return Vec::new();
    }
    let ratio = (actual / predicted).clamp(RATIO_BOUNDS.0, RATIO_BOUNDS.1);
    let share = ratio.powf(1.0 / factors.len() as f64);
    factors
        .iter()
        .map(|f| PlannedUpdate {
            category: f.category,
            key: f.key.clone(),
            observed_ratio: f.value * share,
        })
        .collect()
}

/// A learning target derived from a verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedUpdate {
    pub category: FactorCategory,
    pub key: String,
    pub observed_ratio: f64,
}

/// Payload of a `verification` insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    pub for_date: String,
    pub predicted: f64,
    pub actual: f64,
    pub accuracy: f64,
    /// Context active when the prediction was made
    pub context: ForecastContext,
    pub prediction_id: u64,
    /// Whether this date's learning pass is attributed to this record
    pub learning_applied: bool,
    #[serde(default)]
    pub updates: Vec<PlannedUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// First verification for the date
    Recorded,
    /// Replaced an earlier verification with different values
    Superseded,
    /// An identical verification already existed; nothing changed
    Skipped,
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub insight: Insight,
    pub accuracy: f64,
    pub updates: Vec<MultiplierUpdate>,
}

pub struct VerificationJob {
    ledger: Arc<InsightLedger>,
    learner: Arc<FactorLearner>,
    history: Option<Arc<dyn HistorySource>>,
    epsilon: f64,
}

impl VerificationJob {
    pub fn new(ledger: Arc<InsightLedger>, learner: Arc<FactorLearner>) -> Self {
        Self {
            ledger,
            learner,
            history: None,
            epsilon: 1e-9,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySource>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Verify `for_date` against the daily total recorded in history
    pub fn verify_from_history(&self, for_date: NaiveDate) -> Result<VerificationOutcome, ForecastError> {
        let missing = || ForecastError::MissingActuals {
            for_date: format_date(for_date),
        };
        let history = self.history.as_ref().ok_or_else(missing)?;
        let day = history.day(for_date)?.ok_or_else(missing)?;
        self.verify(for_date, day.total())
    }

    /// Verify the latest stored prediction for `for_date` against `actual`.
    ///
    /// Each date contributes at most one learning pass: an identical re-run is
    /// skipped, a corrected re-run supersedes the record without relearning.
    /// The lookup and the write happen under one ledger lock, so concurrent
    /// runs for the same date cannot both learn.
    pub fn verify(&self, for_date: NaiveDate, actual: f64) -> Result<VerificationOutcome, ForecastError> {
        let fd = format_date(for_date);
        if !actual.is_finite() || actual < 0.0 {
            return Err(ForecastError::InvalidActual {
                for_date: fd,
                value: actual,
            });
        }

        // The record is durable before any multiplier moves, so a crash can
        // under-learn but never double-count.
        let committed = self
            .ledger
            .transact(|insights| self.decide(insights, &fd, actual))?;

        let (insight, removed, plan) = match committed {
            Committed::Kept(Skipped { insight, accuracy }) => {
                tracing::info!(for_date = %fd, id = insight.id, "verification already recorded, skipping");
                return Ok(VerificationOutcome {
                    status: VerificationStatus::Skipped,
                    insight,
                    accuracy,
                    updates: Vec::new(),
                });
            }
            Committed::Written {
                insight,
                removed,
                value,
            } => (insight, removed, value),
        };

        if plan.status == VerificationStatus::Superseded {
            tracing::info!(for_date = %fd, removed, relearned = !plan.planned.is_empty(), "verification superseded");
        }

        let mut updates = Vec::with_capacity(plan.planned.len());
        for target in &plan.planned {
            updates.push(
                self.learner
                    .update(target.category, &target.key, target.observed_ratio, 1.0)?,
            );
        }

        tracing::info!(
            for_date = %fd,
            predicted = plan.predicted,
            actual,
            accuracy = plan.accuracy,
            updates = updates.len(),
            "verification recorded"
        );
        Ok(VerificationOutcome {
            status: plan.status,
            insight,
            accuracy: plan.accuracy,
            updates,
        })
    }

    /// Runs under the ledger lock: what this verification should write, if anything
    fn decide(
        &self,
        insights: &[Insight],
        fd: &str,
        actual: f64,
    ) -> Result<Transaction<Skipped, Plan>, ForecastError> {
        let prediction = latest_in(insights, InsightKind::Prediction, fd).ok_or_else(|| {
            ForecastError::MissingPrediction {
                for_date: fd.to_string(),
            }
        })?;
        let predicted: PredictionDetails = decode(prediction)?;

        let previous = match latest_in(insights, InsightKind::Verification, fd) {
            Some(insight) => Some((decode::<VerificationDetails>(insight)?, insight)),
            None => None,
        };

        if let Some((ref details, insight)) = previous {
            if details.prediction_id == prediction.id
                && (details.predicted - predicted.predicted).abs() <= SAME_VALUE_TOLERANCE
                && (details.actual - actual).abs() <= SAME_VALUE_TOLERANCE
            {
                return Ok(Transaction::Keep(Skipped {
                    insight: insight.clone(),
                    accuracy: details.accuracy,
                }));
            }
        }

        let already_learned = previous
            .as_ref()
            .map_or(false, |(details, _)| details.learning_applied);
        let planned = if already_learned || predicted.predicted <= self.epsilon {
            Vec::new()
        } else {
            attribute(&predicted.factors, predicted.predicted, actual)
        };

        let acc = accuracy(predicted.predicted, actual, self.epsilon);
        let details = VerificationDetails {
            for_date: fd.to_string(),
            predicted: predicted.predicted,
            actual,
            accuracy: acc,
            context: predicted.context.clone(),
            prediction_id: prediction.id,
            learning_applied: already_learned || !planned.is_empty(),
            updates: planned.clone(),
        };
        let append = NewInsight::new(InsightKind::Verification, &details).map_err(PersistenceError::from)?;
        let remove = insights
            .iter()
            .filter(|i| i.kind == InsightKind::Verification && i.for_date() == Some(fd))
            .map(|i| i.id)
            .collect();
        let status = if previous.is_some() {
            VerificationStatus::Superseded
        } else {
            VerificationStatus::Recorded
        };

        Ok(Transaction::Write {
            remove,
            append,
            value: Plan {
                status,
                planned,
                accuracy: acc,
                predicted: predicted.predicted,
            },
        })
    }
}

/// An identical verification already on record
struct Skipped {
    insight: Insight,
    accuracy: f64,
}

/// What a committed verification still has to apply
struct Plan {
    status: VerificationStatus,
    planned: Vec<PlannedUpdate>,
    accuracy: f64,
    predicted: f64,
}

fn decode<T: serde::de::DeserializeOwned>(insight: &Insight) -> Result<T, ForecastError> {
    insight
        .details_as()
        .map_err(|source| ForecastError::MalformedInsight {
            id: insight.id,
            source,
        })
}

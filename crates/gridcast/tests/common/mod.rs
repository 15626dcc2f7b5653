#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use gridcast_core::{AdvancedPredictor, Config, HistoryDay, InMemoryHistory, VerificationJob};
use gridcast_learn::{FactorLearner, LearningConfig};
use gridcast_ledger::{InsightLedger, Paths};
use std::sync::Arc;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Weekdays in `[from, until)` with `value` in every hour
pub fn flat_weekdays(from: &str, until: &str, value: f64) -> Vec<HistoryDay> {
    date(from)
        .iter_days()
        .take_while(|d| *d < date(until))
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .map(|d| HistoryDay::flat(d, value))
        .collect()
}

/// Predictor, verifier and their shared stores, persisted under one directory
pub struct Harness {
    pub paths: Paths,
    pub ledger: Arc<InsightLedger>,
    pub learner: Arc<FactorLearner>,
    pub predictor: AdvancedPredictor,
    pub verifier: VerificationJob,
}

impl Harness {
    pub fn open(paths: Paths, days: Vec<HistoryDay>) -> Self {
        let ledger = Arc::new(InsightLedger::open(paths.insights_file()).unwrap());
        let learner = Arc::new(
            FactorLearner::open(paths.multipliers_file(), LearningConfig::default()).unwrap(),
        );
        let history = Arc::new(InMemoryHistory::with_days(days));
        let predictor = AdvancedPredictor::new(Config::default(), history.clone(), Arc::clone(&learner));
        let verifier = VerificationJob::new(Arc::clone(&ledger), Arc::clone(&learner))
            .with_history(history);
        Self {
            paths,
            ledger,
            learner,
            predictor,
            verifier,
        }
    }
}

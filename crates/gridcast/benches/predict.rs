use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use gridcast_core::{AdvancedPredictor, Config, HistoryDay, InMemoryHistory, PredictContext};
use gridcast_learn::{FactorCategory, FactorLearner, LearningConfig};
use std::hint::black_box;
use std::sync::Arc;

fn history_year() -> InMemoryHistory {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    InMemoryHistory::with_days(start.iter_days().take(366).map(|d| {
        let hourly = (0..24).map(|h| 5.0 + (h as f64 / 4.0).sin().abs() * 3.0).collect();
        HistoryDay::new(d, hourly)
    }))
}

fn bench_predict_year_of_history(c: &mut Criterion) {
    let learner = Arc::new(FactorLearner::in_memory(LearningConfig::default()));
    learner
        .set_multiplier(FactorCategory::Season, "winter", 1.1)
        .unwrap();
    let predictor = AdvancedPredictor::new(Config::default(), Arc::new(history_year()), learner);
    let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let ctx = PredictContext::weather("rain");

    c.bench_function("predict_year_of_history", |b| {
        b.iter(|| predictor.predict(black_box(date), Some(&ctx)).unwrap());
    });
}

fn bench_learner_update(c: &mut Criterion) {
    let learner = FactorLearner::in_memory(LearningConfig::default());

    c.bench_function("learner_update_in_memory", |b| {
        b.iter(|| {
            learner
                .update(FactorCategory::Weather, black_box("rain"), 1.2, 1.0)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_predict_year_of_history, bench_learner_update);
criterion_main!(benches);

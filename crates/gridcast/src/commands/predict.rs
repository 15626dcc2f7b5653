use super::Workspace;
use gridcast_core::{PredictContext, Prediction};

pub fn run(date: &str, weather: Option<&str>, record: bool, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::open()?;
    let predictor = ws.predictor();
    let context = weather.map(PredictContext::weather);
    let prediction = predictor.predict_str(date, context.as_ref())?;

    if record {
        predictor.record(&prediction, &ws.ledger)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("{}", render(&prediction));
    }
    Ok(())
}

/// Human-readable forecast: context, factor breakdown, hourly table
fn render(p: &Prediction) -> String {
    let mut out = format!(
        "Forecast for {} ({} {}, weather: {}, holiday: {})\n",
        p.date, p.context.season, p.context.day_type, p.context.weather, p.context.holiday
    );
    out.push_str(&format!(
        "Baseline from {} day(s): {:.2}  x{:.3}  =>  {:.2}\n",
        p.baseline_days, p.baseline_total, p.combined_multiplier, p.total
    ));

    if let Some(first) = p.hours.first() {
        out.push_str("\nFactors\n=======\n");
        for factor in first.factors.values() {
            out.push_str(&format!("  {}\n", factor.description));
        }
    }

    out.push_str("\nHour  Baseline  Forecast\n");
    for h in &p.hours {
        out.push_str(&format!("{:>4}  {:>8.2}  {:>8.2}\n", h.hour, h.baseline, h.adjusted));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TempHome;
    use chrono::NaiveDate;
    use gridcast_core::HistoryDay;
    use gridcast_ledger::InsightKind;
    use serial_test::serial;

    fn seed_history(ws: &Workspace) {
        for day in [8, 13, 14] {
            let date = NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
            ws.history.record(HistoryDay::flat(date, 10.0)).unwrap();
        }
    }

    #[test]
    #[serial]
    fn test_predict_records_insight() {
        let _home = TempHome::new();
        seed_history(&Workspace::open().unwrap());

        run("2025-01-15", Some("rain"), true, false).unwrap();
        run("2025-01-15", None, false, true).unwrap();

        let ws = Workspace::open().unwrap();
        let predictions = ws.ledger.query(|i| i.kind == InsightKind::Prediction);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].for_date(), Some("2025-01-15"));
    }

    #[test]
    #[serial]
    fn test_predict_without_history_fails() {
        let _home = TempHome::new();
        assert!(run("2025-01-15", None, true, false).is_err());
        assert!(run("15/01/2025", None, true, false).is_err());
        assert!(Workspace::open().unwrap().ledger.is_empty());
    }

    #[test]
    #[serial]
    fn test_render_lists_every_hour() {
        let home = TempHome::new();
        let ws = Workspace::open().unwrap();
        seed_history(&ws);
        let p = ws.predictor().predict_str("2025-01-15", None).unwrap();

        let text = render(&p);
        assert!(text.contains("Forecast for 2025-01-15 (winter weekday"));
        assert!(text.contains("season winter"));
        assert_eq!(text.lines().filter(|l| l.ends_with("10.00")).count(), 24);
        drop(home);
    }
}

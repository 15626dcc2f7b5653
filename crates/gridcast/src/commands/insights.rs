use super::Workspace;
use gridcast_core::{format_date, parse_date};
use gridcast_ledger::{Insight, InsightKind, InsightQuery};

pub fn run(kind: Option<&str>, date: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let query = build_query(kind, date)?;
    let ws = Workspace::open()?;
    let found = ws.ledger.find(&query);

    if found.is_empty() {
        println!("No insights");
        return Ok(());
    }

    let shown = &found[found.len().saturating_sub(limit)..];
    println!("Insights ({} of {})", shown.len(), found.len());
    println!("======================");
    for insight in shown {
        println!("{}", render_line(insight));
    }
    Ok(())
}

fn build_query(kind: Option<&str>, date: Option<&str>) -> anyhow::Result<InsightQuery> {
    let mut query = InsightQuery::new();
    if let Some(kind) = kind {
        query = query.kind(kind.parse::<InsightKind>().map_err(anyhow::Error::msg)?);
    }
    if let Some(date) = date {
        query = query.for_date(format_date(parse_date(date)?));
    }
    Ok(query)
}

fn render_line(insight: &Insight) -> String {
    let d = &insight.details;
    let num = |key: &str| d.get(key).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
    let summary = match insight.kind {
        InsightKind::Prediction => format!("predicted {:.2}", num("predicted")),
        InsightKind::Verification => format!(
            "predicted {:.2} actual {:.2} accuracy {:.1}%",
            num("predicted"),
            num("actual"),
            num("accuracy") * 100.0
        ),
        InsightKind::Note => d
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    };
    format!(
        "  #{:<4} {:<12} {:<10} {} | {}",
        insight.id,
        insight.kind.as_str(),
        insight.for_date().unwrap_or("-"),
        insight.date.format("%Y-%m-%d %H:%M"),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_build_query_validates_inputs() {
        assert!(build_query(Some("prediction"), Some("2025-01-15")).is_ok());
        assert!(build_query(Some("forecast"), None).is_err());
        assert!(build_query(None, Some("yesterday")).is_err());
    }

    #[test]
    fn test_render_verification_line() {
        let insight = Insight {
            id: 3,
            kind: InsightKind::Verification,
            date: Utc.with_ymd_and_hms(2025, 1, 16, 6, 0, 0).unwrap(),
            details: serde_json::json!({
                "forDate": "2025-01-15",
                "predicted": 240.0,
                "actual": 276.0,
                "accuracy": 0.8696
            }),
        };
        let line = render_line(&insight);
        assert!(line.contains("#3"));
        assert!(line.contains("2025-01-15"));
        assert!(line.contains("accuracy 87.0%"));
    }

    #[test]
    fn test_render_note_without_date() {
        let insight = Insight {
            id: 1,
            kind: InsightKind::Note,
            date: Utc.with_ymd_and_hms(2025, 1, 16, 6, 0, 0).unwrap(),
            details: serde_json::json!({ "text": "meter swapped" }),
        };
        let line = render_line(&insight);
        assert!(line.contains(" - "));
        assert!(line.ends_with("meter swapped"));
    }
}

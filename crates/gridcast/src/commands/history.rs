use super::Workspace;
use gridcast_core::VerificationDetails;
use gridcast_ledger::{Insight, InsightKind, InsightQuery};

const RECENT: usize = 20;

fn decode_verifications(insights: &[Insight]) -> Vec<VerificationDetails> {
    insights
        .iter()
        .filter_map(|i| match i.details_as::<VerificationDetails>() {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(id = i.id, error = %e, "skipping malformed verification");
                None
            }
        })
        .collect()
}

fn compute_stats(verifications: &[VerificationDetails]) -> String {
    if verifications.is_empty() {
        return "No verifications to analyze.".to_string();
    }
    let total = verifications.len();
    let avg_accuracy = verifications.iter().map(|v| v.accuracy).sum::<f64>() / total as f64;
    let ratios: Vec<f64> = verifications
        .iter()
        .filter(|v| v.predicted > 0.0)
        .map(|v| v.actual / v.predicted)
        .collect();
    let bias = if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    };
    let learned = verifications.iter().filter(|v| v.learning_applied).count();

    format!(
        "Verified days: {}\n\
         Avg accuracy: {:.1}%\n\
         Avg actual/predicted: {}\n\
         Days that updated multipliers: {}",
        total,
        avg_accuracy * 100.0,
        bias.map_or_else(|| "n/a".to_string(), |b| format!("{b:.3}")),
        learned
    )
}

pub fn run(stats: bool) -> anyhow::Result<()> {
    let ws = Workspace::open()?;
    let insights = ws
        .ledger
        .find(&InsightQuery::new().kind(InsightKind::Verification));
    let mut verifications = decode_verifications(&insights);

    if verifications.is_empty() {
        println!("No verification history");
        return Ok(());
    }

    if stats {
        println!("{}", compute_stats(&verifications));
        return Ok(());
    }

    verifications.sort_by(|a, b| a.for_date.cmp(&b.for_date));
    let shown = &verifications[verifications.len().saturating_sub(RECENT)..];

    println!("Recent Verifications (last {})", shown.len());
    println!("==============================");
    for v in shown {
        println!(
            "  {} | {} {:<8} | predicted:{:.2} actual:{:.2} accuracy:{:.0}%",
            v.for_date,
            v.context.season,
            v.context.weather,
            v.predicted,
            v.actual,
            v.accuracy * 100.0,
        );
    }
    Ok(())
}

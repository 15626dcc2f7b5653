use super::Workspace;
use gridcast_core::{parse_date, VerificationOutcome, VerificationStatus};

pub fn run(date: &str, actual: Option<f64>) -> anyhow::Result<()> {
    let ws = Workspace::open()?;
    let for_date = parse_date(date)?;
    let job = ws.verifier();

    let outcome = match actual {
        Some(value) => job.verify(for_date, value)?,
        None => job.verify_from_history(for_date)?,
    };
    println!("{}", summarize(&outcome));
    Ok(())
}

fn summarize(outcome: &VerificationOutcome) -> String {
    let status = match outcome.status {
        VerificationStatus::Recorded => "recorded",
        VerificationStatus::Superseded => "superseded earlier verification",
        VerificationStatus::Skipped => "already verified, nothing changed",
    };
    let mut out = format!(
        "Verification {} (insight #{}): accuracy {:.1}%",
        status,
        outcome.insight.id,
        outcome.accuracy * 100.0
    );
    for u in &outcome.updates {
        if !u.applied {
            continue;
        }
        out.push_str(&format!(
            "\n  {}: {:.4} -> {:.4} (n={}){}",
            u.category,
            u.previous,
            u.value,
            u.sample_count,
            if u.clamped { " [clamped]" } else { "" }
        ));
    }
    out
}

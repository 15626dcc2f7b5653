use super::{require_admin, Workspace};
use gridcast_learn::{FactorCategory, MultiplierSnapshot};

pub fn run_list() -> anyhow::Result<()> {
    let ws = Workspace::open()?;
    println!("{}", render(&ws.learner.snapshot()));
    Ok(())
}

/// `--set CATEGORY KEY VALUE`
pub fn run_set(args: &[String], key: Option<&str>) -> anyhow::Result<()> {
    require_admin(key)?;
    let (category, factor_key, value) = parse_set(args)?;
    let ws = Workspace::open()?;

    let stored = ws.learner.set_multiplier(category, &factor_key, value)?;
    if (stored - value).abs() > f64::EPSILON {
        let (lo, hi) = category.bounds();
        println!("{category} {factor_key} = {stored:.4} (clamped to [{lo}, {hi}])");
    } else {
        println!("{category} {factor_key} = {stored:.4}");
    }
    Ok(())
}

pub fn run_reset(category: Option<&str>, key: Option<&str>) -> anyhow::Result<()> {
    require_admin(key)?;
    let category = category
        .map(|c| c.parse::<FactorCategory>().map_err(anyhow::Error::msg))
        .transpose()?;
    let ws = Workspace::open()?;

    let removed = ws.learner.reset(category)?;
    match category {
        Some(c) => println!("Reset {removed} {c} multiplier(s)"),
        None => println!("Reset {removed} multiplier(s)"),
    }
    Ok(())
}

fn parse_set(args: &[String]) -> anyhow::Result<(FactorCategory, String, f64)> {
    let [category, key, value] = args else {
        anyhow::bail!("--set takes CATEGORY KEY VALUE");
    };
    let category = category.parse::<FactorCategory>().map_err(anyhow::Error::msg)?;
    let value: f64 = value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid multiplier {value:?}: {e}"))?;
    if !value.is_finite() || value <= 0.0 {
        anyhow::bail!("multiplier must be a positive number, got {value}");
    }
    Ok((category, key.trim().to_lowercase(), value))
}

fn render(snapshot: &MultiplierSnapshot) -> String {
    if snapshot.is_empty() {
        return "No learned multipliers (every factor is 1.0)".to_string();
    }
    let mut out = String::from("Category       Key               Value   Samples  Confidence\n");
    for (category, key, entry) in snapshot.iter() {
        out.push_str(&format!(
            "{:<14} {:<16} {:>6.3}   {:>7}  {:>9.0}%\n",
            category.as_str(),
            key,
            entry.value,
            entry.sample_count,
            entry.confidence() * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TempHome;
    use serial_test::serial;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_set() {
        let (category, key, value) = parse_set(&args(&["season", "Winter", "1.1"])).unwrap();
        assert_eq!(category, FactorCategory::Season);
        assert_eq!(key, "winter");
        assert_eq!(value, 1.1);

        assert!(parse_set(&args(&["moon", "full", "1.1"])).is_err());
        assert!(parse_set(&args(&["season", "winter", "abc"])).is_err());
        assert!(parse_set(&args(&["season", "winter", "-2"])).is_err());
        assert!(parse_set(&args(&["season", "winter"])).is_err());
    }

    #[test]
    #[serial]
    fn test_set_then_reset() {
        let _home = TempHome::new();
        run_set(&args(&["season", "winter", "1.1"]), None).unwrap();
        run_set(&args(&["combined", "total", "9"]), None).unwrap();

        let ws = Workspace::open().unwrap();
        assert_eq!(ws.learner.get_multiplier(FactorCategory::Season, "winter"), 1.1);
        assert_eq!(ws.learner.get_multiplier(FactorCategory::Combined, "total"), 2.0);
        let table = render(&ws.learner.snapshot());
        assert!(table.contains("winter"));
        assert!(table.contains("combined_mult"));
        drop(ws);

        run_reset(Some("season"), None).unwrap();
        assert!(run_reset(Some("moon"), None).is_err());
        let ws = Workspace::open().unwrap();
        assert_eq!(ws.learner.get_multiplier(FactorCategory::Season, "winter"), 1.0);
        assert_eq!(ws.learner.snapshot().len(), 1);
    }

    #[test]
    fn test_render_empty() {
        assert!(render(&MultiplierSnapshot::default()).contains("1.0"));
    }
}

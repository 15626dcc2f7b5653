use super::Workspace;
use gridcast_core::{parse_date, HistoryDay, HOURS};

pub fn run(date: &str, values: Vec<f64>) -> anyhow::Result<()> {
    let ws = Workspace::open()?;
    let day = HistoryDay::new(parse_date(date)?, expand(values)?);
    let total = day.total();
    ws.history.record(day)?;
    println!(
        "Recorded actuals for {date}: total {total:.2} ({})",
        ws.paths.history_file().display()
    );
    Ok(())
}

/// A single value stands for a flat day; otherwise exactly 24 are required
fn expand(values: Vec<f64>) -> anyhow::Result<Vec<f64>> {
    match values.len() {
        1 => Ok(vec![values[0]; HOURS]),
        HOURS => Ok(values),
        n => anyhow::bail!("expected 1 or {HOURS} hourly values, got {n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TempHome;
    use gridcast_core::HistorySource;
    use serial_test::serial;

    #[test]
    fn test_expand() {
        assert_eq!(expand(vec![2.0]).unwrap(), vec![2.0; 24]);
        assert_eq!(expand(vec![1.0; 24]).unwrap().len(), 24);
        assert!(expand(vec![1.0; 5]).is_err());
    }

    #[test]
    #[serial]
    fn test_observe_writes_history() {
        let _home = TempHome::new();
        run("2025-01-14", vec![3.0]).unwrap();
        assert!(run("2025-01-14", vec![-1.0]).is_err());

        let ws = Workspace::open().unwrap();
        let day = ws
            .history
            .day(parse_date("2025-01-14").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(day.total(), 72.0);
    }
}

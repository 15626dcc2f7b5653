use super::{require_admin, Workspace};
use gridcast_core::{format_date, parse_date};

pub fn run(date: &str, key: Option<&str>) -> anyhow::Result<()> {
    require_admin(key)?;
    let for_date = format_date(parse_date(date)?);
    let ws = Workspace::open()?;

    let removed = ws.ledger.remove_by_for_date(&for_date)?;
    if removed == 0 {
        println!("No insights for {for_date}");
    } else {
        println!("Removed {removed} insight(s) for {for_date}");
    }
    Ok(())
}

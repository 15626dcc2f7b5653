pub fn run() -> anyhow::Result<()> {
    println!("gridcast {}", env!("CARGO_PKG_VERSION"));
    println!("Hourly forecasting with learned context multipliers");
    Ok(())
}

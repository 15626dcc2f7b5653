mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            date,
            weather,
            dry_run,
            json,
        } => commands::predict::run(&date, weather.as_deref(), !dry_run, json),
        Commands::Verify { date, actual } => commands::verify::run(&date, actual),
        Commands::Observe { date, values } => commands::observe::run(&date, values),
        Commands::Purge { date, key } => commands::purge::run(&date, key.as_deref()),
        Commands::Insights { kind, date, limit } => {
            commands::insights::run(kind.as_deref(), date.as_deref(), limit)
        }
        Commands::Factors { set, reset, key } => match (set, reset) {
            (Some(args), _) => commands::factors::run_set(&args, key.as_deref()),
            (None, Some(category)) => {
                commands::factors::run_reset(category.as_deref(), key.as_deref())
            }
            (None, None) => commands::factors::run_list(),
        },
        Commands::History { stats } => commands::history::run(stats),
        Commands::Version => commands::version::run(),
    }
}

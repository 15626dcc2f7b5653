use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gridcast")]
#[command(version)]
#[command(about = "Hourly forecasting with learned context multipliers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forecast 24 hourly values for a date and record the prediction
    Predict {
        /// Target date (YYYY-MM-DD)
        date: String,

        /// Weather label for the date (overrides the configured provider)
        #[arg(short, long)]
        weather: Option<String>,

        /// Print the forecast without recording it
        #[arg(long)]
        dry_run: bool,

        /// Print the full prediction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a recorded prediction with actuals and update multipliers
    Verify {
        /// Date that was predicted (YYYY-MM-DD)
        date: String,

        /// Observed daily total; read from recorded history when omitted
        #[arg(short, long)]
        actual: Option<f64>,
    },

    /// Record observed hourly actuals for a date
    Observe {
        /// Date observed (YYYY-MM-DD)
        date: String,

        /// 24 hourly values, or a single value repeated for every hour
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Delete every insight about a date (admin)
    Purge {
        /// Date whose insights are removed (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Admin key, required when GRIDCAST_ADMIN_KEY is set
        #[arg(long)]
        key: Option<String>,
    },

    /// List recorded insights
    Insights {
        /// Only this type: prediction, verification or note
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Only insights about this date
        #[arg(short, long)]
        date: Option<String>,

        /// Show at most this many, newest last
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show, override or reset learned multipliers
    Factors {
        /// Override one multiplier (admin)
        #[arg(long, num_args = 3, value_names = ["CATEGORY", "KEY", "VALUE"])]
        set: Option<Vec<String>>,

        /// Clear learned multipliers, optionally for one category (admin)
        #[arg(long, num_args = 0..=1, value_name = "CATEGORY")]
        reset: Option<Option<String>>,

        /// Admin key, required when GRIDCAST_ADMIN_KEY is set
        #[arg(long)]
        key: Option<String>,
    },

    /// Summarize prediction accuracy over recorded verifications
    History {
        /// Show statistics summary only
        #[arg(long)]
        stats: bool,
    },

    /// Print version information
    Version,
}

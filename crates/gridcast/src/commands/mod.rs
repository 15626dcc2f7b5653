pub mod factors;
pub mod history;
pub mod insights;
pub mod observe;
pub mod predict;
pub mod purge;
pub mod verify;
pub mod version;

use gridcast_core::{AdvancedPredictor, Config, JsonlHistory, VerificationJob};
use gridcast_learn::FactorLearner;
use gridcast_ledger::{InsightLedger, Paths};
use std::sync::Arc;

/// Environment variable holding the admin key for mutating maintenance commands
pub const ADMIN_KEY_ENV: &str = "GRIDCAST_ADMIN_KEY";

/// Everything a command needs, opened from one data directory
pub struct Workspace {
    pub paths: Paths,
    pub config: Config,
    pub ledger: Arc<InsightLedger>,
    pub learner: Arc<FactorLearner>,
    pub history: Arc<JsonlHistory>,
}

impl Workspace {
    /// Open the data directory from `$GRIDCAST_HOME` or `~/.gridcast`
    pub fn open() -> anyhow::Result<Self> {
        Self::at(Paths::new()?)
    }

    pub fn at(paths: Paths) -> anyhow::Result<Self> {
        std::fs::create_dir_all(paths.data_dir())?;
        let config = Config::load(&paths.config_file())?;
        let ledger = InsightLedger::open(paths.insights_file())?;
        let learner = FactorLearner::open(paths.multipliers_file(), config.learning)?;
        let history = JsonlHistory::new(paths.history_file());
        tracing::debug!(data_dir = %paths.data_dir().display(), insights = ledger.len(), "workspace opened");

        Ok(Self {
            paths,
            config,
            ledger: Arc::new(ledger),
            learner: Arc::new(learner),
            history: Arc::new(history),
        })
    }

    pub fn predictor(&self) -> AdvancedPredictor {
        AdvancedPredictor::new(
            self.config.clone(),
            self.history.clone(),
            Arc::clone(&self.learner),
        )
    }

    pub fn verifier(&self) -> VerificationJob {
        VerificationJob::new(Arc::clone(&self.ledger), Arc::clone(&self.learner))
            .with_history(self.history.clone())
            .with_epsilon(self.config.accuracy_epsilon)
    }
}

/// Gate a mutating admin command on `GRIDCAST_ADMIN_KEY`.
///
/// Open when the variable is unset or empty.
pub fn require_admin(provided: Option<&str>) -> anyhow::Result<()> {
    let expected = match std::env::var(ADMIN_KEY_ENV) {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(()),
    };
    match provided {
        Some(key) if key == expected => Ok(()),
        Some(_) => anyhow::bail!("admin key does not match {ADMIN_KEY_ENV}"),
        None => anyhow::bail!("{ADMIN_KEY_ENV} is set; pass --key to run this command"),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use gridcast_ledger::HOME_ENV;
    use tempfile::TempDir;

    /// Point `$GRIDCAST_HOME` at a fresh directory for the guard's lifetime
    pub struct TempHome {
        pub dir: TempDir,
        previous: Option<std::ffi::OsString>,
    }

    impl TempHome {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let previous = std::env::var_os(HOME_ENV);
            unsafe { std::env::set_var(HOME_ENV, dir.path()) };
            Self { dir, previous }
        }
    }

    impl Drop for TempHome {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(v) => unsafe { std::env::set_var(HOME_ENV, v) },
                None => unsafe { std::env::remove_var(HOME_ENV) },
            }
        }
    }
}

//! Multiplicative factor learning for forecast correction

mod factor;
mod learner;

pub use factor::{
    FactorCategory, MultiplierEntry, MultiplierSnapshot, MultiplierSource, Resolved, DEFAULT_KEY,
    NEUTRAL,
};
pub use learner::{FactorLearner, LearnError, LearningConfig, MultiplierUpdate};

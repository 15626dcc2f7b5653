//! Insight ledger and persistence primitives for gridcast

mod error;
mod insight;
mod io;
mod ledger;
mod paths;

pub use error::PersistenceError;
pub use insight::{Insight, InsightKind, NewInsight, FOR_DATE_KEY};
pub use io::{atomic_write, encode_jsonl, read_jsonl, read_jsonl_lenient};
pub use ledger::{latest_in, Committed, InsightLedger, InsightQuery, Transaction};
pub use paths::{Paths, HOME_ENV};

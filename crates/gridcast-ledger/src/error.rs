//! Persistence errors shared by every durable store in the workspace

use std::path::{Path, PathBuf};
use thiserror::Error;

/// A durable store could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure while performing `op` on `path`.
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be decoded.
    #[error("corrupt record at {}:{line}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded before writing.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

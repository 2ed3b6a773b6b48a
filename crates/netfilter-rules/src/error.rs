//! Error types for rule loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Errors raised while building a [`RuleStore`](crate::RuleStore).
///
/// Every variant is recoverable from the caller's point of view: the
/// dispatcher treats any of them as an indeterminate decision.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule source could not be read.
    #[error("cannot read rule file '{}': {source}", path.display())]
    Io {
        /// Path of the rule source.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The rule source is a FIFO, device, directory, or other non-regular file.
    #[error("rule file '{}' is not a regular file", path.display())]
    NotAFile {
        /// Path of the rule source.
        path: PathBuf,
    },

    /// The rule source exceeds the loader's size cap.
    #[error("rule file '{}' is too large: more than {max} bytes", path.display())]
    TooLarge {
        /// Path of the rule source.
        path: PathBuf,
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// A line could not be turned into a rule.
    #[error("{origin}:{line}: {reason}")]
    Parse {
        /// Name of the rule source (file path or `inline`).
        origin: String,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading policy data or evaluating a submission.
///
/// Only [`GateError::Internal`] escapes [`Gate::job_submit`](crate::eval::Gate::job_submit);
/// whitelist access failures are absorbed by the sources, which then grant nothing.
#[derive(Debug, Error)]
pub enum GateError {
    /// A whitelist or map file could not be opened or stat'ed.
    #[error("cannot access {}: {source}", path.display())]
    ConfigAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A whitelist or map file failed part way through a load.
    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The gate's own TOML configuration does not parse.
    #[error("config parse error in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Operational fault unrelated to policy (e.g. a poisoned cache lock).
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// True for faults that must be reported as `InternalError` rather than a verdict.
    pub fn is_internal(&self) -> bool {
        matches!(self, GateError::Internal(_))
    }
}

//! Sweep error types.

use thiserror::Error;

use crate::params::PerfParams;

/// Errors produced by a benchmark sweep.
///
/// Any of these aborts the whole sweep; there is no per-trial retry. The
/// cleanup guards (parameter restoration, scratch-directory removal) run
/// regardless of which variant is returned.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The operator produced no target product. Treated as an unrecoverable
    /// precondition violation, not something to skip over.
    #[error("operator produced no target product")]
    MissingTarget,

    #[error("target product creation failed")]
    TargetCreation(#[source] anyhow::Error),

    #[error("operator execution failed under {params}")]
    Execution {
        params: PerfParams,
        #[source]
        source: anyhow::Error,
    },

    #[error("no trials configured for the sweep")]
    EmptySet,

    #[error("scratch directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, SweepError>;

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while planning, routing or recombining split work.
///
/// Every variant aborts the run: the engine never returns partial output.
#[derive(Error, Debug)]
pub enum SplitError {
    /// Caller-supplied wiring broke an engine precondition.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Processed output {0:?} has no entry in the combine map")]
    UnmappedOutput(PathBuf),

    #[error(
        "Extras reconciliation shortfall: attached {attached} + standalone {standalone} < {total} extras"
    )]
    ReconciliationShortfall {
        attached: usize,
        standalone: usize,
        total: usize,
    },

    #[error("No task registered under '{0}'")]
    UnknownTask(String),

    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Split function failed: {0}")]
    Split(#[source] anyhow::Error),

    #[error("Group function failed: {0}")]
    Group(#[source] anyhow::Error),
}

impl SplitError {
    pub(crate) fn contract<S: Into<String>>(msg: S) -> Self {
        SplitError::ContractViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;

use thiserror::Error;

use crate::domain::activity::ActivityStatus;

/// Failure taxonomy for the payment workflow.
///
/// Interface layers map each variant to a transport status; only
/// `Unexpected` maps to a generic server failure, and any `Unexpected` that
/// surfaces after the activity lock was taken must release it on the way
/// out. Extractor failures and transfer timeouts never appear here — both
/// are recovered inside their components.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("activity not found: {0}")]
    ActivityNotFound(String),
    #[error("no active policy is configured")]
    PolicyNotFound,
    #[error("activity {0} is already being processed")]
    Locked(String),
    #[error("cannot process activity in status {status}")]
    InvalidState { status: ActivityStatus },
    #[error("{0}")]
    PolicyViolation(String),
    #[error("payment backend failure: {0}")]
    Upstream(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl WorkflowError {
    /// Stable machine-readable class for logs and CLI output.
    pub fn class(&self) -> &'static str {
        match self {
            Self::ActivityNotFound(_) | Self::PolicyNotFound => "not_found",
            Self::Locked(_) => "conflict",
            Self::InvalidState { .. } => "invalid_state",
            Self::PolicyViolation(_) => "policy_violation",
            Self::Upstream(_) => "upstream",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

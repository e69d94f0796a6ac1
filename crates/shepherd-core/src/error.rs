//! Error taxonomy for a shepherd run.
//!
//! Probe failures never show up here: the prober folds them into an
//! unreachable slot. Everything below is fatal for the run.

use shepherd_github::OracleError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ShepherdError {
    /// Rejected before any network activity
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Pull request state query or comment failed
    #[error("source-control host error: {0}")]
    Oracle(#[from] OracleError),

    /// No tier produced a slot. Only reachable with a broken slot layout.
    #[error("no deployment slot could be selected among {slot_count} slot(s)")]
    NoSlotSelectable { slot_count: usize },
}

impl ShepherdError {
    /// Whether the error stems from configuration rather than the run itself.
    pub fn is_config(&self) -> bool {
        matches!(self, ShepherdError::InvalidConfig(_))
    }
}

/// Result type for shepherd operations.
pub type Result<T> = std::result::Result<T, ShepherdError>;

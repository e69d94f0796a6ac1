//! Shepherd-GitHub: the pull-request oracle for deployment-shepherd
//!
//! The slot decision engine needs exactly two things from the source-control
//! host: whether a pull request is closed, and a way to leave a comment on
//! it. This crate defines that capability as the [`PullRequestOracle`] trait
//! and ships three implementations:
//!
//! - [`GitHubClient`]: talks to the GitHub REST API over `reqwest`
//! - [`DryRunOracle`]: wraps another oracle, keeps its reads, logs its writes
//! - [`fakes::MemoryOracle`]: in-memory fake for tests
//!
//! All operations target the single (owner, repository) pair the oracle was
//! built for.

mod client;
mod dry_run;
mod error;
pub mod fakes;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{GitHubClient, GitHubConfig, DEFAULT_API_URL};
pub use dry_run::DryRunOracle;
pub use error::OracleError;

/// Result type for oracle operations
pub type Result<T> = std::result::Result<T, OracleError>;

/// Numeric pull request identifier, as used in `pulls/{n}` and `issues/{n}`.
pub type PullRequestId = u64;

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

/// An (owner, repository) pair on the source-control host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: &str, name: &str) -> Self {
        RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Capability the decision engine needs from the source-control host.
///
/// Implementations must not retry on their own: a failed query or a failed
/// comment is surfaced to the caller, which treats it as fatal for the run.
#[async_trait]
pub trait PullRequestOracle: Send + Sync {
    /// Fetch the current state of a pull request.
    async fn pull_request_state(&self, id: PullRequestId) -> Result<PullRequestState>;

    /// Post a comment on the pull request's conversation.
    async fn comment(&self, id: PullRequestId, body: &str) -> Result<()>;

    /// Whether the pull request is closed.
    ///
    /// An absent id counts as closed: there is no pull request to protect.
    async fn is_closed(&self, id: Option<PullRequestId>) -> Result<bool> {
        match id {
            None => Ok(true),
            Some(id) => Ok(self.pull_request_state(id).await? == PullRequestState::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryOracle;

    #[test]
    fn test_repo_ref_display() {
        let repo = RepoRef::new("Crunchie84", "PullRequestCommenter");
        assert_eq!(repo.to_string(), "Crunchie84/PullRequestCommenter");
    }

    #[test]
    fn test_pull_request_state_wire_format() {
        let state: PullRequestState = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(state, PullRequestState::Closed);
        assert_eq!(
            serde_json::to_string(&PullRequestState::Open).unwrap(),
            "\"open\""
        );
    }

    #[tokio::test]
    async fn test_absent_id_is_closed_without_query() {
        let oracle = MemoryOracle::new();
        assert!(oracle.is_closed(None).await.unwrap());
        assert!(oracle.queries().is_empty());
    }

    #[tokio::test]
    async fn test_is_closed_reflects_state() {
        let oracle = MemoryOracle::new()
            .with_pull_request(7, PullRequestState::Open)
            .with_pull_request(8, PullRequestState::Closed);

        assert!(!oracle.is_closed(Some(7)).await.unwrap());
        assert!(oracle.is_closed(Some(8)).await.unwrap());
        assert_eq!(oracle.queries(), vec![7, 8]);
    }
}

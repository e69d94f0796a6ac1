//! Dry-run wrapper: real reads, logged writes.

use async_trait::async_trait;
use tracing::info;

use crate::{PullRequestId, PullRequestOracle, PullRequestState, Result};

/// Oracle wrapper for diagnostic runs.
///
/// State queries are forwarded to the wrapped oracle (and can still fail the
/// run). Comments are logged and never sent.
pub struct DryRunOracle<O> {
    inner: O,
}

impl<O: PullRequestOracle> DryRunOracle<O> {
    pub fn new(inner: O) -> Self {
        DryRunOracle { inner }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: PullRequestOracle> PullRequestOracle for DryRunOracle<O> {
    async fn pull_request_state(&self, id: PullRequestId) -> Result<PullRequestState> {
        self.inner.pull_request_state(id).await
    }

    async fn comment(&self, id: PullRequestId, body: &str) -> Result<()> {
        info!(
            event = "comment.skipped",
            pull_request = id,
            body = %body,
            "Dry run: was going to comment on pull request"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryOracle;

    #[tokio::test]
    async fn test_dry_run_swallows_comments() {
        let oracle = DryRunOracle::new(MemoryOracle::new());
        oracle.comment(12, "Going to deploy").await.unwrap();
        assert!(oracle.inner().comments().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_still_queries_state() {
        let oracle =
            DryRunOracle::new(MemoryOracle::new().with_pull_request(5, PullRequestState::Closed));
        assert!(oracle.is_closed(Some(5)).await.unwrap());
        assert_eq!(oracle.inner().queries(), vec![5]);
    }

    #[tokio::test]
    async fn test_dry_run_propagates_query_failures() {
        let oracle = DryRunOracle::new(MemoryOracle::new().failing_on(5));
        assert!(oracle.is_closed(Some(5)).await.is_err());
    }
}

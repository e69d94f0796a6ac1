//! In-memory fake for [`PullRequestOracle`] (testing only)
//!
//! `MemoryOracle` answers state queries from a fixed table and records every
//! query and comment so tests can assert on call order.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::OracleError;
use crate::{PullRequestId, PullRequestOracle, PullRequestState, Result};

/// A comment recorded by [`MemoryOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub pull_request: PullRequestId,
    pub body: String,
}

/// In-memory oracle backed by a `HashMap<id, state>`.
///
/// Unknown ids answer like GitHub does: a 404 status error.
#[derive(Debug, Default)]
pub struct MemoryOracle {
    states: HashMap<PullRequestId, PullRequestState>,
    failing: HashSet<PullRequestId>,
    failing_comments: HashSet<PullRequestId>,
    queries: Mutex<Vec<PullRequestId>>,
    comments: Mutex<Vec<PostedComment>>,
}

impl MemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pull request with the given state.
    pub fn with_pull_request(mut self, id: PullRequestId, state: PullRequestState) -> Self {
        self.states.insert(id, state);
        self
    }

    /// Make every query and comment for `id` fail with a transport error.
    pub fn failing_on(mut self, id: PullRequestId) -> Self {
        self.failing.insert(id);
        self
    }

    /// Make only comments on `id` fail; state queries keep working.
    pub fn failing_comments_on(mut self, id: PullRequestId) -> Self {
        self.failing_comments.insert(id);
        self
    }

    /// Ids queried so far, in call order.
    pub fn queries(&self) -> Vec<PullRequestId> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Comments posted so far, in call order.
    pub fn comments(&self) -> Vec<PostedComment> {
        self.comments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PullRequestOracle for MemoryOracle {
    async fn pull_request_state(&self, id: PullRequestId) -> Result<PullRequestState> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);

        if self.failing.contains(&id) {
            return Err(OracleError::Http(format!("connection reset while fetching {}", id)));
        }

        self.states
            .get(&id)
            .copied()
            .ok_or_else(|| OracleError::Status {
                operation: format!("get pull request {}", id),
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn comment(&self, id: PullRequestId, body: &str) -> Result<()> {
        if self.failing.contains(&id) || self.failing_comments.contains(&id) {
            return Err(OracleError::Http(format!("connection reset while commenting on {}", id)));
        }

        self.comments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PostedComment {
                pull_request: id,
                body: body.to_string(),
            });
        Ok(())
    }
}

//! GitHub REST client
//!
//! Implements [`PullRequestOracle`] against the GitHub v3 REST API:
//! - `GET  /repos/{owner}/{repo}/pulls/{n}` for the pull request state
//! - `POST /repos/{owner}/{repo}/issues/{n}/comments` for comments
//!
//! The access token is only ever passed to `bearer_auth()`. It is never
//! logged and never part of an error message.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OracleError;
use crate::{PullRequestId, PullRequestOracle, PullRequestState, RepoRef, Result};

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("deployment-shepherd/", env!("CARGO_PKG_VERSION"));

/// GitHub client configuration
#[derive(Clone)]
pub struct GitHubConfig {
    /// API base URL (no trailing slash needed)
    pub api_url: String,
    /// Repository the pull requests live in
    pub repo: RepoRef,
    /// Personal access token
    pub token: String,
    /// Timeout applied to every request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GitHubConfig {
    /// Create config for a repository on public GitHub
    pub fn new(owner: &str, repository: &str, token: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            repo: RepoRef::new(owner, repository),
            token: token.to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Point the client at another API endpoint (GitHub Enterprise, tests)
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.repo.owner.trim().is_empty() {
            return Err(OracleError::InvalidConfig("owner must not be empty".to_string()));
        }
        if self.repo.name.trim().is_empty() {
            return Err(OracleError::InvalidConfig(
                "repository must not be empty".to_string(),
            ));
        }
        if self.token.trim().is_empty() {
            return Err(OracleError::InvalidConfig(
                "access token must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    state: PullRequestState,
}

#[derive(Debug, Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// GitHub client for pull request state and comments
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OracleError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    /// Repository this client talks to
    pub fn repo(&self) -> &RepoRef {
        &self.config.repo
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo.owner,
            self.config.repo.name,
            tail
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Turn a non-success response into an [`OracleError::Status`].
    async fn status_error(operation: String, response: reqwest::Response) -> OracleError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);

        OracleError::Status {
            operation,
            status,
            message,
        }
    }
}

#[async_trait]
impl PullRequestOracle for GitHubClient {
    async fn pull_request_state(&self, id: PullRequestId) -> Result<PullRequestState> {
        let url = self.repo_url(&format!("pulls/{}", id));
        debug!(pull_request = id, repo = %self.config.repo, "Fetching pull request state");

        let response = self.authorized(self.http_client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(Self::status_error(format!("get pull request {}", id), response).await);
        }

        let body = response.text().await?;
        let pr: PullRequestResponse = serde_json::from_str(&body)?;
        debug!(pull_request = id, state = ?pr.state, "Pull request state fetched");
        Ok(pr.state)
    }

    async fn comment(&self, id: PullRequestId, body: &str) -> Result<()> {
        let url = self.repo_url(&format!("issues/{}/comments", id));
        debug!(pull_request = id, repo = %self.config.repo, "Creating pull request comment");

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&NewComment { body })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(
                Self::status_error(format!("comment on pull request {}", id), response).await,
            );
        }

        Ok(())
    }
}

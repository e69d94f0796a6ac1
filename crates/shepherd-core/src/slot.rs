//! Slot identity, the status payload a slot serves, and the probed status.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use shepherd_github::PullRequestId;

use crate::branch::parse_pull_request_id;

/// Identifier of one deployment slot, e.g. `pullrequestslot2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: &str) -> Self {
        SlotId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlotId {
    fn from(id: &str) -> Self {
        SlotId::new(id)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of `GET /api/status` as served by a deployed application.
///
/// Field names follow the camelCase convention of the deployed apps; the
/// PascalCase spelling is accepted as well.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Branch whose build occupies the slot
    #[serde(alias = "BranchName")]
    pub branch_name: String,

    /// When that build was produced
    #[serde(alias = "BuildDate", deserialize_with = "deserialize_build_date")]
    pub build_date: DateTime<Utc>,

    /// Pull request id as reported by the app. Never trusted.
    #[serde(default, rename = "pullrequestId", alias = "PullrequestId")]
    pub pullrequest_id: Option<serde_json::Value>,

    /// Slot the app believes it is deployed to
    #[serde(default, alias = "DeploySlotId")]
    pub deploy_slot_id: Option<String>,
}

/// Parse an ISO-8601 build date.
///
/// RFC 3339 with an offset is read as is. A local time without offset, as
/// .NET writes an unspecified `DateTime` (`2016-03-01T10:00:00.123`), is
/// read as UTC.
fn parse_build_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_build_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_build_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid buildDate '{}'", raw)))
}

/// Occupancy of one slot as observed during this run.
///
/// Built once by the prober and read-only afterwards. An unreachable slot
/// carries no branch, build date or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    slot_id: SlotId,
    branch_name: Option<String>,
    build_date: Option<DateTime<Utc>>,
    pull_request_id: Option<PullRequestId>,
    reachable: bool,
    attempts: u32,
}

impl SlotStatus {
    /// A reachable slot running `branch_name`, built at `build_date`.
    ///
    /// The pull request id is always derived from the branch name.
    pub fn deployed(slot_id: SlotId, branch_name: &str, build_date: DateTime<Utc>) -> Self {
        SlotStatus {
            slot_id,
            branch_name: Some(branch_name.to_string()),
            build_date: Some(build_date),
            pull_request_id: parse_pull_request_id(branch_name),
            reachable: true,
            attempts: 1,
        }
    }

    /// A slot that could not be read after `attempts` tries.
    pub fn unreachable(slot_id: SlotId, attempts: u32) -> Self {
        SlotStatus {
            slot_id,
            branch_name: None,
            build_date: None,
            pull_request_id: None,
            reachable: false,
            attempts,
        }
    }

    /// Build a status from a successfully fetched payload.
    pub fn from_payload(slot_id: SlotId, payload: &StatusPayload, attempts: u32) -> Self {
        Self::deployed(slot_id, &payload.branch_name, payload.build_date).with_attempts(attempts)
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.slot_id
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch_name.as_deref()
    }

    pub fn build_date(&self) -> Option<DateTime<Utc>> {
        self.build_date
    }

    pub fn pull_request_id(&self) -> Option<PullRequestId> {
        self.pull_request_id
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Number of probe attempts spent on this slot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Free for allocation: unreachable, or nothing deployed.
    pub fn is_empty(&self) -> bool {
        !self.reachable || self.branch_name.is_none()
    }

    /// Whether `branch_name` is what this slot currently runs.
    pub fn holds_branch(&self, branch_name: &str) -> bool {
        self.branch_name.as_deref() == Some(branch_name)
    }
}

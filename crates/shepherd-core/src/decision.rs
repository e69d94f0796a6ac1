//! Slot decision engine.
//!
//! Picks exactly one slot from the joined probe results. Tiers are tried in
//! order and the first one that produces a slot wins:
//!
//! 1. Already deployed: a slot already runs the target branch. No comment.
//! 2. Empty: the first unreachable or unoccupied slot.
//! 3. Closed pull request: the first slot, in slot order, whose pull request
//!    the oracle reports closed. Queries stop at the first hit.
//! 4. Oldest build: the reachable slot with the earliest build date, first
//!    in slot order on ties. An open pull request living there is warned
//!    before it is displaced.
//!
//! Tiers 2-4 announce the chosen slot on the target's pull request, if the
//! target branch has one. Oracle calls are strictly sequential and any
//! oracle failure aborts the decision.

use serde::Serialize;
use shepherd_github::{PullRequestId, PullRequestOracle};
use tracing::debug;

use crate::branch::parse_pull_request_id;
use crate::config::UrlTemplate;
use crate::error::{Result, ShepherdError};
use crate::obs;
use crate::slot::{SlotId, SlotStatus};

/// Posted on a pull request whose deployment is being overwritten.
pub const DISPLACEMENT_WARNING: &str = ":warning::no_entry: This deployment has been overwritten by another pull request thus is no longer available :no_entry::warning:";

/// Comment announcing where a pull request is about to be deployed.
pub fn announcement(slot_url: &str) -> String {
    format!(
        "Going to deploy this pull request to {} so you can easily test it.",
        slot_url
    )
}

/// The rule that produced the chosen slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    AlreadyDeployed,
    EmptySlot,
    ClosedPullRequest,
    OldestBuild,
}

impl std::fmt::Display for DecisionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DecisionTier::AlreadyDeployed => "already_deployed",
            DecisionTier::EmptySlot => "empty_slot",
            DecisionTier::ClosedPullRequest => "closed_pull_request",
            DecisionTier::OldestBuild => "oldest_build",
        };
        f.write_str(name)
    }
}

/// What a comment was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Announcement,
    DisplacementWarning,
}

impl CommentKind {
    fn as_str(&self) -> &'static str {
        match self {
            CommentKind::Announcement => "announcement",
            CommentKind::DisplacementWarning => "displacement_warning",
        }
    }
}

/// A comment handed to the oracle during the decision, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentAction {
    pub pull_request: PullRequestId,
    pub kind: CommentKind,
}

/// Inputs of one decision. Consumed by [`DecisionEngine::decide`].
#[derive(Debug, Clone)]
pub struct DecisionContext {
    target_branch: String,
    target_pull_request: Option<PullRequestId>,
    slots: Vec<SlotStatus>,
}

impl DecisionContext {
    /// `slots` must hold one status per configured slot, in configured order.
    pub fn new(target_branch: &str, slots: Vec<SlotStatus>) -> Self {
        DecisionContext {
            target_branch: target_branch.to_string(),
            target_pull_request: parse_pull_request_id(target_branch),
            slots,
        }
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    pub fn target_pull_request(&self) -> Option<PullRequestId> {
        self.target_pull_request
    }

    pub fn slots(&self) -> &[SlotStatus] {
        &self.slots
    }
}

/// Outcome of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub slot_id: SlotId,
    pub tier: DecisionTier,
    pub comments: Vec<CommentAction>,
}

/// Applies the tiered slot policy, calling the oracle as it goes.
pub struct DecisionEngine<'a> {
    oracle: &'a dyn PullRequestOracle,
    template: &'a UrlTemplate,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(oracle: &'a dyn PullRequestOracle, template: &'a UrlTemplate) -> Self {
        DecisionEngine { oracle, template }
    }

    /// Pick the slot for `context`.
    pub async fn decide(&self, context: DecisionContext) -> Result<Decision> {
        let target = context.target_branch();
        let slots = context.slots();

        if let Some(status) = already_deployed(slots, target) {
            debug!(slot = %status.slot_id(), "Branch is already deployed here");
            return Ok(self.finish(status.slot_id(), DecisionTier::AlreadyDeployed, Vec::new()));
        }

        let target_pr = context.target_pull_request();

        if let Some(status) = first_empty(slots) {
            debug!(
                slot = %status.slot_id(),
                reachable = status.is_reachable(),
                "Found an empty slot"
            );
            let mut comments = Vec::new();
            self.announce(target_pr, status.slot_id(), &mut comments)
                .await?;
            return Ok(self.finish(status.slot_id(), DecisionTier::EmptySlot, comments));
        }

        if let Some(status) = self.first_closed(slots).await? {
            debug!(
                slot = %status.slot_id(),
                pull_request = ?status.pull_request_id(),
                "Found a slot holding a closed pull request"
            );
            let mut comments = Vec::new();
            self.announce(target_pr, status.slot_id(), &mut comments)
                .await?;
            return Ok(self.finish(status.slot_id(), DecisionTier::ClosedPullRequest, comments));
        }

        if let Some(status) = oldest_build(slots) {
            debug!(
                slot = %status.slot_id(),
                build_date = ?status.build_date(),
                "Falling back to the oldest deployment"
            );
            let mut comments = Vec::new();
            // Tier 3 already found every pull request still deployed to be open.
            if let Some(displaced) = status.pull_request_id() {
                debug!(pull_request = displaced, "Warning the pull request being displaced");
                self.post(
                    displaced,
                    CommentKind::DisplacementWarning,
                    DISPLACEMENT_WARNING,
                    &mut comments,
                )
                .await?;
            }
            self.announce(target_pr, status.slot_id(), &mut comments)
                .await?;
            return Ok(self.finish(status.slot_id(), DecisionTier::OldestBuild, comments));
        }

        Err(ShepherdError::NoSlotSelectable {
            slot_count: slots.len(),
        })
    }

    /// Tier 3: sequential, short-circuiting closedness checks.
    async fn first_closed<'s>(&self, slots: &'s [SlotStatus]) -> Result<Option<&'s SlotStatus>> {
        for status in slots.iter().filter(|s| s.pull_request_id().is_some()) {
            if self.oracle.is_closed(status.pull_request_id()).await? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    async fn announce(
        &self,
        target_pr: Option<PullRequestId>,
        slot: &SlotId,
        comments: &mut Vec<CommentAction>,
    ) -> Result<()> {
        match target_pr {
            Some(pr) => {
                let body = announcement(&self.template.slot_url(slot));
                self.post(pr, CommentKind::Announcement, &body, comments)
                    .await
            }
            None => Ok(()),
        }
    }

    async fn post(
        &self,
        pull_request: PullRequestId,
        kind: CommentKind,
        body: &str,
        comments: &mut Vec<CommentAction>,
    ) -> Result<()> {
        self.oracle.comment(pull_request, body).await?;
        obs::emit_comment_posted(pull_request, kind.as_str());
        comments.push(CommentAction { pull_request, kind });
        Ok(())
    }

    fn finish(&self, slot: &SlotId, tier: DecisionTier, comments: Vec<CommentAction>) -> Decision {
        obs::emit_decision_made(slot, tier, comments.len());
        Decision {
            slot_id: slot.clone(),
            tier,
            comments,
        }
    }
}

/// Tier 1: first slot already running `branch`.
fn already_deployed<'s>(slots: &'s [SlotStatus], branch: &str) -> Option<&'s SlotStatus> {
    slots.iter().find(|s| s.holds_branch(branch))
}

/// Tier 2: first unreachable or unoccupied slot.
fn first_empty(slots: &[SlotStatus]) -> Option<&SlotStatus> {
    slots.iter().find(|s| s.is_empty())
}

/// Tier 4: reachable slot with the minimum build date; `min_by_key` keeps
/// the first of equal minima, which preserves slot order on ties.
fn oldest_build(slots: &[SlotStatus]) -> Option<&SlotStatus> {
    slots
        .iter()
        .filter(|s| s.is_reachable())
        .filter_map(|s| s.build_date().map(|date| (s, date)))
        .min_by_key(|(_, date)| *date)
        .map(|(s, _)| s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn at(hours: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::hours(hours)
    }

    fn deployed(slot: &str, branch: &str, hours: i64) -> SlotStatus {
        SlotStatus::deployed(SlotId::new(slot), branch, at(hours))
    }

    #[test]
    fn test_already_deployed_takes_first_match() {
        let slots = vec![
            deployed("s1", "develop", 1),
            deployed("s2", "pull/5", 2),
            deployed("s3", "pull/5", 3),
        ];
        let found = already_deployed(&slots, "pull/5").unwrap();
        assert_eq!(found.slot_id().as_str(), "s2");
        assert!(already_deployed(&slots, "pull/6").is_none());
    }

    #[test]
    fn test_first_empty_prefers_slot_order() {
        let slots = vec![
            deployed("s1", "develop", 1),
            SlotStatus::unreachable(SlotId::new("s2"), 4),
            SlotStatus::unreachable(SlotId::new("s3"), 4),
        ];
        assert_eq!(first_empty(&slots).unwrap().slot_id().as_str(), "s2");
    }

    #[test]
    fn test_oldest_build_breaks_ties_by_slot_order() {
        let slots = vec![
            deployed("s1", "a", 5),
            deployed("s2", "b", 1),
            deployed("s3", "c", 1),
        ];
        assert_eq!(oldest_build(&slots).unwrap().slot_id().as_str(), "s2");
    }

    #[test]
    fn test_oldest_build_ignores_unreachable() {
        let slots = vec![
            SlotStatus::unreachable(SlotId::new("s1"), 4),
            deployed("s2", "b", 3),
        ];
        assert_eq!(oldest_build(&slots).unwrap().slot_id().as_str(), "s2");
        assert!(oldest_build(&slots[..1]).is_none());
    }

    #[test]
    fn test_announcement_text() {
        assert_eq!(
            announcement("http://site-slot1.example.com"),
            "Going to deploy this pull request to http://site-slot1.example.com so you can easily test it."
        );
    }

    #[test]
    fn test_context_derives_target_pull_request() {
        let ctx = DecisionContext::new("pull/42/merge", Vec::new());
        assert_eq!(ctx.target_pull_request(), Some(42));
        let ctx = DecisionContext::new("develop", Vec::new());
        assert_eq!(ctx.target_pull_request(), None);
    }

    #[test]
    fn test_tier_display_matches_serde() {
        for tier in [
            DecisionTier::AlreadyDeployed,
            DecisionTier::EmptySlot,
            DecisionTier::ClosedPullRequest,
            DecisionTier::OldestBuild,
        ] {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier));
        }
    }
}

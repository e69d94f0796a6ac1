//! Structured observability hooks for a shepherd run.
//!
//! This module provides:
//! - A run-scoped span carrying a generated `run_id`
//! - Emission functions for the key events: run start, slot probed, probe
//!   failed, comment posted, decision made
//!
//! Everything goes through `tracing`; the binary routes it to stderr so
//! stdout carries nothing but the chosen slot id.

use tracing::{debug, info, warn};

use crate::decision::DecisionTier;
use crate::slot::SlotId;

/// Span tagging every event of one run, probe tasks included.
///
/// Attach with `tracing::Instrument::instrument`; an entered span guard
/// cannot be held across the run's await points.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("shepherd.run", run_id = %run_id)
}

/// Emit event: run started for a branch over `slot_count` slots.
pub fn emit_run_started(run_id: &str, branch_name: &str, slot_count: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        branch = %branch_name,
        slot_count = slot_count,
    );
}

/// Emit event: a slot answered its status probe.
pub fn emit_slot_probed(slot: &SlotId, branch_name: &str, attempts: u32) {
    debug!(
        event = "slot.probed",
        slot = %slot,
        branch = %branch_name,
        attempts = attempts,
    );
}

/// Emit event: a slot exhausted its attempts and counts as empty (warning level).
pub fn emit_slot_probe_failed(slot: &SlotId, attempts: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "slot.probe_failed",
        slot = %slot,
        attempts = attempts,
        error = %error,
    );
}

/// Emit event: a comment was posted on a pull request.
pub fn emit_comment_posted(pull_request: u64, kind: &str) {
    info!(event = "comment.posted", pull_request = pull_request, kind = %kind);
}

/// Emit event: the engine picked a slot.
pub fn emit_decision_made(slot: &SlotId, tier: DecisionTier, comments: usize) {
    info!(
        event = "decision.made",
        slot = %slot,
        tier = %tier,
        comments = comments,
    );
}

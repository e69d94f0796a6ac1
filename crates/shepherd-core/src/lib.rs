//! Shepherd Core: deployment slot selection
//!
//! Given a branch about to be deployed by CI, find out which of a fixed set
//! of deployment slots it should go to:
//!
//! - [`prober`] reads every slot's `/api/status`, concurrently, with retries
//! - [`branch`] recognises pull request branches and extracts their id
//! - [`decision`] applies the ordered slot policy and leaves pull request
//!   comments through a [`shepherd_github::PullRequestOracle`]
//! - [`orchestrator`] wires the three together for one run
//!
//! A run is stateless: re-running it against unchanged slots picks the same
//! slot and posts nothing new.

pub mod branch;
pub mod config;
pub mod decision;
pub mod error;
pub mod obs;
pub mod orchestrator;
pub mod prober;
pub mod slot;
pub mod telemetry;

pub use branch::parse_pull_request_id;
pub use config::{
    ProbeConfig, ShepherdConfig, SlotLayout, UrlTemplate, DEFAULT_SLOT_COUNT,
    DEFAULT_SLOT_PREFIX, SLOT_PLACEHOLDER,
};
pub use decision::{
    announcement, CommentAction, CommentKind, Decision, DecisionContext, DecisionEngine,
    DecisionTier, DISPLACEMENT_WARNING,
};
pub use error::{Result, ShepherdError};
pub use orchestrator::{find_deployment_slot, probe_all};
pub use prober::SlotProber;
pub use slot::{SlotId, SlotStatus, StatusPayload};
pub use telemetry::init_tracing;

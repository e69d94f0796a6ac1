//! Run orchestration: probe every slot concurrently, then decide.
//!
//! One tokio task per slot, joined in configured order. The decision engine
//! only starts once every probe has settled, so it always sees the complete
//! occupancy picture.

use std::sync::Arc;

use futures::future::join_all;
use shepherd_github::PullRequestOracle;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use crate::config::ShepherdConfig;
use crate::decision::{Decision, DecisionContext, DecisionEngine};
use crate::error::Result;
use crate::obs;
use crate::prober::SlotProber;
use crate::slot::{SlotId, SlotStatus};

/// Probe all `slots` concurrently.
///
/// Returns one status per slot, in the order given. A probe task that dies
/// is reported as an unreachable slot with zero attempts.
pub async fn probe_all(prober: Arc<SlotProber>, slots: &[SlotId]) -> Vec<SlotStatus> {
    let tasks: Vec<JoinHandle<SlotStatus>> = slots
        .iter()
        .map(|slot| {
            let prober = Arc::clone(&prober);
            let slot = slot.clone();
            tokio::spawn(
                async move { prober.probe(&slot).await }.instrument(tracing::Span::current()),
            )
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .zip(slots)
        .map(|(joined, slot)| match joined {
            Ok(status) => status,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Probe task failed, treating slot as unreachable");
                SlotStatus::unreachable(slot.clone(), 0)
            }
        })
        .collect()
}

/// Find the slot `branch_name` should be deployed to.
///
/// Comments go through `oracle`; wrap it in a
/// [`shepherd_github::DryRunOracle`] to keep the run read-only.
pub async fn find_deployment_slot(
    config: &ShepherdConfig,
    oracle: &dyn PullRequestOracle,
    branch_name: &str,
) -> Result<Decision> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = obs::run_span(&run_id);

    async {
        let layout = &config.layout;
        obs::emit_run_started(&run_id, branch_name, layout.slots().len());

        let prober = Arc::new(SlotProber::new(
            layout.template().clone(),
            config.probe.clone(),
        )?);
        let statuses = probe_all(prober, layout.slots()).await;

        let unreachable = statuses.iter().filter(|s| !s.is_reachable()).count();
        info!(
            slots = statuses.len(),
            unreachable = unreachable,
            "All slots probed"
        );

        let context = DecisionContext::new(branch_name, statuses);
        DecisionEngine::new(oracle, layout.template())
            .decide(context)
            .await
    }
    .instrument(span)
    .await
}

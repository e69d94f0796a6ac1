//! Slot prober: read one slot's status with bounded, jittered retries.
//!
//! A probe never fails from the caller's point of view. Transport errors,
//! timeouts, non-2xx answers and malformed bodies are all retried the same
//! way; once the attempts are spent the slot is reported unreachable and is
//! treated as free by the decision engine.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::branch::parse_pull_request_id;
use crate::config::{ProbeConfig, UrlTemplate};
use crate::error::{Result, ShepherdError};
use crate::obs;
use crate::slot::{SlotId, SlotStatus, StatusPayload};

const USER_AGENT: &str = concat!("deployment-shepherd/", env!("CARGO_PKG_VERSION"));

/// Why a single probe attempt failed. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed status payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Reads `/api/status` of individual slots.
pub struct SlotProber {
    template: UrlTemplate,
    config: ProbeConfig,
    http_client: reqwest::Client,
}

impl SlotProber {
    /// Create a prober; fails only on an unusable configuration.
    pub fn new(template: UrlTemplate, config: ProbeConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ShepherdError::HttpClient(e.to_string()))?;

        Ok(SlotProber {
            template,
            config,
            http_client,
        })
    }

    /// Probe a slot, retrying up to `max_attempts` times in total.
    pub async fn probe(&self, slot_id: &SlotId) -> SlotStatus {
        let url = self.template.status_url(slot_id);
        let max_attempts = self.config.max_attempts;

        let mut attempt = 1;
        loop {
            debug!(slot = %slot_id, url = %url, attempt = attempt, "Fetching slot status");

            match self.fetch(&url).await {
                Ok(payload) => {
                    self.check_payload(slot_id, &payload);
                    obs::emit_slot_probed(slot_id, &payload.branch_name, attempt);
                    return SlotStatus::from_payload(slot_id.clone(), &payload, attempt);
                }
                Err(error) if attempt >= max_attempts => {
                    obs::emit_slot_probe_failed(slot_id, attempt, &error);
                    return SlotStatus::unreachable(slot_id.clone(), attempt);
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        slot = %slot_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Slot probe failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<StatusPayload, ProbeError> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Slot status response");
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let nominal = self.config.backoff_after(attempt);
        if self.config.jitter {
            let factor = 0.5 + rand::random::<f64>() * 0.5;
            Duration::from_secs_f64(nominal.as_secs_f64() * factor)
        } else {
            nominal
        }
    }

    /// Log payload fields that disagree with what we know; they never win.
    fn check_payload(&self, slot_id: &SlotId, payload: &StatusPayload) {
        if let Some(reported) = payload.deploy_slot_id.as_deref() {
            if reported != slot_id.as_str() {
                warn!(
                    slot = %slot_id,
                    reported_slot = %reported,
                    "Slot reports a different deploy slot id"
                );
            }
        }

        if let Some(reported) = payload.pullrequest_id.as_ref().filter(|v| !v.is_null()) {
            let derived = parse_pull_request_id(&payload.branch_name);
            if reported.as_u64() != derived {
                debug!(
                    slot = %slot_id,
                    reported = %reported,
                    derived = ?derived,
                    "Ignoring pull request id supplied by the slot"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober(jitter: bool) -> SlotProber {
        let config = ProbeConfig {
            initial_backoff: Duration::from_millis(100),
            jitter,
            ..ProbeConfig::default()
        };
        SlotProber::new(UrlTemplate::parse("{0}.example.test").unwrap(), config).unwrap()
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = ProbeConfig {
            max_attempts: 0,
            ..ProbeConfig::default()
        };
        let result = SlotProber::new(UrlTemplate::parse("{0}.example.test").unwrap(), config);
        assert!(matches!(result, Err(ShepherdError::InvalidConfig(_))));
    }

    #[test]
    fn test_delay_without_jitter_is_nominal() {
        let prober = prober(false);
        assert_eq!(prober.delay_after(1), Duration::from_millis(100));
        assert_eq!(prober.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn test_jittered_delay_stays_within_half_to_full() {
        let prober = prober(true);
        for _ in 0..100 {
            let delay = prober.delay_after(2);
            assert!(delay >= Duration::from_millis(100), "{:?}", delay);
            assert!(delay <= Duration::from_millis(200), "{:?}", delay);
        }
    }
}

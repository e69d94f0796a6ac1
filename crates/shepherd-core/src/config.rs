//! Run configuration: slot layout, URL template and probe policy.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Result, ShepherdError};
use crate::slot::SlotId;

/// Placeholder substituted with the slot id in a [`UrlTemplate`].
pub const SLOT_PLACEHOLDER: &str = "{0}";

/// Default slot name prefix; slots are `pullrequestslot1..=N`.
pub const DEFAULT_SLOT_PREFIX: &str = "pullrequestslot";

/// Default number of slots.
pub const DEFAULT_SLOT_COUNT: usize = 4;

const STATUS_PATH: &str = "/api/status";

/// Host pattern for a slot, e.g. `mywebsite-{0}.azurewebsites.net`.
///
/// Without an explicit scheme, `http://` is assumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let template = template.trim();
        if template.is_empty() {
            return Err(ShepherdError::InvalidConfig(
                "base url template must not be empty".to_string(),
            ));
        }
        if !template.contains(SLOT_PLACEHOLDER) {
            return Err(ShepherdError::InvalidConfig(format!(
                "base url template '{}' has no {} placeholder for the slot id",
                template, SLOT_PLACEHOLDER
            )));
        }
        Ok(UrlTemplate(template.trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public URL of a slot; this is what pull request comments link to.
    pub fn slot_url(&self, slot: &SlotId) -> String {
        let host = self.0.replace(SLOT_PLACEHOLDER, slot.as_str());
        if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("http://{}", host)
        }
    }

    /// Status endpoint of a slot.
    pub fn status_url(&self, slot: &SlotId) -> String {
        format!("{}{}", self.slot_url(slot), STATUS_PATH)
    }
}

/// The fixed, ordered set of slots considered in a run.
#[derive(Debug, Clone)]
pub struct SlotLayout {
    template: UrlTemplate,
    slots: Vec<SlotId>,
}

impl SlotLayout {
    /// Explicit slot list. Order is significant: it breaks every tie.
    pub fn new(template: UrlTemplate, slots: Vec<SlotId>) -> Result<Self> {
        if slots.is_empty() {
            return Err(ShepherdError::InvalidConfig(
                "at least one deployment slot is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for slot in &slots {
            if slot.as_str().trim().is_empty() {
                return Err(ShepherdError::InvalidConfig(
                    "slot ids must not be empty".to_string(),
                ));
            }
            if !seen.insert(slot.as_str()) {
                return Err(ShepherdError::InvalidConfig(format!(
                    "slot id '{}' is listed twice",
                    slot
                )));
            }
        }

        Ok(SlotLayout { template, slots })
    }

    /// Slots named `{prefix}1` through `{prefix}{count}`.
    pub fn numbered(template: UrlTemplate, prefix: &str, count: usize) -> Result<Self> {
        let slots = (1..=count)
            .map(|i| SlotId::new(&format!("{}{}", prefix, i)))
            .collect();
        Self::new(template, slots)
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }
}

/// Retry policy for slot probes.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Total attempts per slot, first try included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    /// Backoff multiplier between retries
    pub multiplier: f64,
    /// Randomise each delay to 50-100% of its nominal value
    pub jitter: bool,
    /// Timeout for a single status request
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ProbeConfig {
    /// Nominal delay after failed attempt number `attempt` (1-based), before jitter.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ShepherdError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ShepherdError::InvalidConfig(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Everything a run needs besides the oracle and the target branch.
#[derive(Debug, Clone)]
pub struct ShepherdConfig {
    pub layout: SlotLayout,
    pub probe: ProbeConfig,
}

impl ShepherdConfig {
    pub fn new(layout: SlotLayout) -> Self {
        ShepherdConfig {
            layout,
            probe: ProbeConfig::default(),
        }
    }

    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> UrlTemplate {
        UrlTemplate::parse("mywebsite-{0}.azurewebsites.net").unwrap()
    }

    #[test]
    fn test_template_without_placeholder_is_rejected() {
        let err = UrlTemplate::parse("mywebsite.azurewebsites.net").unwrap_err();
        assert!(err.to_string().contains("{0}"));
        assert!(UrlTemplate::parse("   ").is_err());
    }

    #[test]
    fn test_slot_url_defaults_to_http() {
        let slot = SlotId::new("pullrequestslot2");
        assert_eq!(
            template().slot_url(&slot),
            "http://mywebsite-pullrequestslot2.azurewebsites.net"
        );
        assert_eq!(
            template().status_url(&slot),
            "http://mywebsite-pullrequestslot2.azurewebsites.net/api/status"
        );
    }

    #[test]
    fn test_slot_url_keeps_explicit_scheme() {
        let template = UrlTemplate::parse("https://{0}.example.com/").unwrap();
        assert_eq!(
            template.status_url(&SlotId::new("a")),
            "https://a.example.com/api/status"
        );
    }

    #[test]
    fn test_numbered_layout() {
        let layout = SlotLayout::numbered(template(), DEFAULT_SLOT_PREFIX, 4).unwrap();
        let ids: Vec<&str> = layout.slots().iter().map(|s| s.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "pullrequestslot1",
                "pullrequestslot2",
                "pullrequestslot3",
                "pullrequestslot4"
            ]
        );
    }

    #[test]
    fn test_zero_slots_is_rejected() {
        assert!(SlotLayout::numbered(template(), "slot", 0).is_err());
    }

    #[test]
    fn test_duplicate_slots_are_rejected() {
        let slots = vec![SlotId::new("a"), SlotId::new("b"), SlotId::new("a")];
        assert!(SlotLayout::new(template(), slots).is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = ProbeConfig::default();
        assert_eq!(config.backoff_after(1), Duration::from_millis(250));
        assert_eq!(config.backoff_after(2), Duration::from_millis(500));
        assert_eq!(config.backoff_after(3), Duration::from_secs(1));
        assert_eq!(config.backoff_after(10), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let config = ProbeConfig {
            max_attempts: 0,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Knock gate configuration.

use crate::client::template::PayloadTemplate;
use crate::decoy::DecoyPolicy;
use crate::KnockGateError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// The hidden service requests are forwarded to once the gate is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEndpoint {
    /// Host name or IP address of the hidden service.
    pub host: String,

    /// TCP port of the hidden service.
    pub port: u16,

    /// Whether WebSocket upgrades may be forwarded while the gate is open.
    #[serde(default)]
    pub websocket: bool,
}

impl TargetEndpoint {
    /// Create an endpoint with WebSocket forwarding disabled.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            websocket: false,
        }
    }

    /// `host:port` form used by the forwarding layer.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL for plain HTTP forwarding.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.authority())
    }

    /// Base URL for WebSocket forwarding.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.authority())
    }
}

/// Where rotated sequences are announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL the notification is POSTed to.
    pub url: String,

    /// JSON payload template.
    ///
    /// `{{openSequence}}` and `{{closeSequence}}` inside string values are
    /// replaced with the comma-joined tokens.
    pub template: String,
}

/// Periodic sequence rotation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Time between two rotations.
    #[serde(rename = "interval_millis", with = "millis")]
    pub interval: Duration,

    /// Minimum pseudo-word length (characters).
    pub min_length: usize,

    /// Maximum pseudo-word length (characters).
    pub max_length: usize,

    /// Number of tokens in each generated sequence.
    pub count: usize,

    /// Rotate once immediately when the rotator starts.
    #[serde(default)]
    pub rotate_on_start: bool,

    /// Notification target. Required when rotation is enabled.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl RotationConfig {
    /// Check the schedule and word settings, ignoring the notification target.
    pub(crate) fn validate_schedule(&self) -> Result<(), KnockGateError> {
        if self.interval.is_zero() {
            return Err(KnockGateError::ConfigError(
                "rotation interval must be greater than zero".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(KnockGateError::ConfigError(
                "rotation token count must be at least 1".to_string(),
            ));
        }
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(KnockGateError::ConfigError(format!(
                "rotation token length range {}..={} is invalid",
                self.min_length, self.max_length
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), KnockGateError> {
        self.validate_schedule()?;
        let webhook = self.webhook.as_ref().ok_or_else(|| {
            KnockGateError::ConfigError(
                "rotation requires a webhook notification target".to_string(),
            )
        })?;
        if webhook.url.is_empty() {
            return Err(KnockGateError::ConfigError(
                "webhook url cannot be empty".to_string(),
            ));
        }
        PayloadTemplate::parse(&webhook.template)?;
        Ok(())
    }
}

/// Configuration for a knock gate.
///
/// Optional values are `None` when the feature is off. The close sequence
/// defaults to the reversed open sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Hidden service.
    pub target: TargetEndpoint,

    /// Paths that must be requested in order to open the gate.
    pub open_sequence: Vec<String>,

    /// Paths that must be requested in order to close the gate.
    #[serde(default)]
    pub close_sequence: Option<Vec<String>>,

    /// Close the gate automatically this long after it opened.
    #[serde(default, rename = "auto_close_millis", with = "millis_opt")]
    pub auto_close: Option<Duration>,

    /// Maximum gap between two correct open knocks before progress resets.
    #[serde(
        default,
        rename = "open_knocking_max_interval_millis",
        with = "millis_opt"
    )]
    pub open_max_interval: Option<Duration>,

    /// Forwarded HTTP requests allowed per open session.
    #[serde(default)]
    pub http_request_limit: Option<u64>,

    /// Forwarded WebSocket upgrades allowed per open session.
    #[serde(default)]
    pub websocket_upgrade_limit: Option<u64>,

    /// How non-forwarded requests are answered.
    #[serde(default)]
    pub decoy: DecoyPolicy,

    /// Periodic sequence rotation, started by [`KnockGate::start`](crate::KnockGate::start).
    #[serde(default)]
    pub rotation: Option<RotationConfig>,
}

impl GateConfig {
    /// Minimal configuration: target and open sequence, everything else off.
    pub fn new(target: TargetEndpoint, open_sequence: Vec<String>) -> Self {
        Self {
            target,
            open_sequence,
            close_sequence: None,
            auto_close: None,
            open_max_interval: None,
            http_request_limit: None,
            websocket_upgrade_limit: None,
            decoy: DecoyPolicy::None,
            rotation: None,
        }
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, KnockGateError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KnockGateError::ConfigError(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KnockGateError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            KnockGateError::ConfigIO(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Close sequence in effect: the configured one, or the reversed open sequence.
    pub fn effective_close_sequence(&self) -> Vec<String> {
        match &self.close_sequence {
            Some(seq) => seq.clone(),
            None => self.open_sequence.iter().rev().cloned().collect(),
        }
    }

    /// Validate configuration for missing or conflicting options.
    pub fn validate(&self) -> Result<(), KnockGateError> {
        if self.target.host.is_empty() {
            return Err(KnockGateError::ConfigError(
                "target host cannot be empty".to_string(),
            ));
        }
        if self.target.port == 0 {
            return Err(KnockGateError::ConfigError(
                "target port cannot be 0".to_string(),
            ));
        }
        validate_sequence("open_sequence", &self.open_sequence)?;
        if let Some(close) = &self.close_sequence {
            validate_sequence("close_sequence", close)?;
        }
        if self.auto_close.is_some_and(|d| d.is_zero()) {
            return Err(KnockGateError::ConfigError(
                "auto_close must be greater than zero".to_string(),
            ));
        }
        if self.open_max_interval.is_some_and(|d| d.is_zero()) {
            return Err(KnockGateError::ConfigError(
                "open_max_interval must be greater than zero".to_string(),
            ));
        }
        if self.http_request_limit == Some(0) {
            return Err(KnockGateError::ConfigError(
                "http_request_limit must be at least 1".to_string(),
            ));
        }
        if self.websocket_upgrade_limit == Some(0) {
            return Err(KnockGateError::ConfigError(
                "websocket_upgrade_limit must be at least 1".to_string(),
            ));
        }
        self.decoy.validate()?;
        if let Some(rotation) = &self.rotation {
            rotation.validate()?;
        }
        Ok(())
    }
}

fn validate_sequence(name: &str, seq: &[String]) -> Result<(), KnockGateError> {
    if seq.is_empty() {
        return Err(KnockGateError::ConfigError(format!(
            "{} must contain at least one path",
            name
        )));
    }
    if let Some(pos) = seq.iter().position(|token| token.is_empty()) {
        return Err(KnockGateError::ConfigError(format!(
            "{} has an empty path at position {}",
            name, pos
        )));
    }
    Ok(())
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_millis))
    }
}

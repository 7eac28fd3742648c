//! Disguise responses for requests the gate does not forward.
//!
//! A closed gate should look like an ordinary broken or absent server,
//! never like a gate. The [`DecoyResponder`] renders whatever the
//! configured [`DecoyPolicy`] calls for.

pub mod page;
pub mod signature;

use crate::clock::Clock;
use crate::protocol::models::HttpReply;
use crate::KnockGateError;
use serde::{Deserialize, Serialize};
use signature::BrowserFamily;
use std::sync::Arc;

/// How non-forwarded requests are answered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoyPolicy {
    /// Ordinary empty `200` response.
    #[default]
    None,
    /// Byte-exact nginx `500 Internal Server Error` page.
    FakeUpstreamError {
        /// nginx version shown in the `Server` header and page footer.
        version: String,
    },
    /// Close the connection without writing anything.
    ConnectionDrop,
}

impl DecoyPolicy {
    /// Build a policy from mutually exclusive command-line style options.
    pub fn from_options(
        fake_upstream_version: Option<&str>,
        connection_drop: bool,
    ) -> Result<Self, KnockGateError> {
        let policy = match (fake_upstream_version, connection_drop) {
            (Some(_), true) => {
                return Err(KnockGateError::ConfigError(
                    "fake upstream error and connection drop are mutually exclusive".to_string(),
                ))
            }
            (Some(version), false) => Self::FakeUpstreamError {
                version: version.to_string(),
            },
            (None, true) => Self::ConnectionDrop,
            (None, false) => Self::None,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy carries everything it needs.
    pub fn validate(&self) -> Result<(), KnockGateError> {
        if let Self::FakeUpstreamError { version } = self {
            if version.trim().is_empty() {
                return Err(KnockGateError::ConfigError(
                    "fake upstream error requires a server version".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A rendered decoy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoyResponse {
    /// Fall back to an empty `200`.
    Empty,
    /// Write this response, then close.
    Page(HttpReply),
    /// Write nothing and close the connection.
    Drop,
}

/// Renders decoy responses for one gate.
#[derive(Clone)]
pub struct DecoyResponder {
    policy: DecoyPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DecoyResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoyResponder")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DecoyResponder {
    /// Create a responder with a custom clock.
    pub fn with_clock(policy: DecoyPolicy, clock: Arc<dyn Clock>) -> Result<Self, KnockGateError> {
        policy.validate()?;
        Ok(Self { policy, clock })
    }

    /// Render the decoy for a request carrying `user_agent`.
    pub fn render(&self, user_agent: Option<&str>) -> DecoyResponse {
        match &self.policy {
            DecoyPolicy::None => DecoyResponse::Empty,
            DecoyPolicy::FakeUpstreamError { version } => {
                let padded = BrowserFamily::detect(user_agent).replaces_short_errors();
                DecoyResponse::Page(page::error_page(version, padded, self.clock.http_date()))
            }
            DecoyPolicy::ConnectionDrop => DecoyResponse::Drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MockClock, SystemClock};

    const IE10: &str = "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1)";

    fn nginx_responder() -> DecoyResponder {
        DecoyResponder::with_clock(
            DecoyPolicy::FakeUpstreamError {
                version: "1.15.1".to_string(),
            },
            Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z")),
        )
        .unwrap()
    }

    #[test]
    fn test_none_renders_empty() {
        let responder =
            DecoyResponder::with_clock(DecoyPolicy::None, Arc::new(SystemClock)).unwrap();
        assert_eq!(responder.render(Some(IE10)), DecoyResponse::Empty);
    }

    #[test]
    fn test_drop_renders_drop() {
        let responder =
            DecoyResponder::with_clock(DecoyPolicy::ConnectionDrop, Arc::new(SystemClock))
                .unwrap();
        assert_eq!(responder.render(None), DecoyResponse::Drop);
    }

    #[test]
    fn test_fake_error_unpadded_for_plain_client() {
        let DecoyResponse::Page(reply) = nginx_responder().render(Some("curl/8.5.0")) else {
            panic!("expected page");
        };
        assert_eq!(reply.body.len(), 193);
        assert_eq!(reply.header("Content-Length"), Some("193"));
        assert_eq!(reply.header("Date"), Some("Wed, 15 Jan 2025 12:00:00 GMT"));
        assert!(!String::from_utf8_lossy(&reply.body).contains("padding"));
    }

    #[test]
    fn test_fake_error_padded_for_ie() {
        let DecoyResponse::Page(reply) = nginx_responder().render(Some(IE10)) else {
            panic!("expected page");
        };
        assert_eq!(reply.body.len(), 595);
        assert_eq!(reply.header("Content-Length"), Some("595"));
    }

    #[test]
    fn test_missing_version_is_construction_error() {
        let result = DecoyResponder::with_clock(
            DecoyPolicy::FakeUpstreamError {
                version: " ".to_string(),
            },
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(KnockGateError::ConfigError(_))));
    }

    #[test]
    fn test_from_options() {
        assert_eq!(
            DecoyPolicy::from_options(None, false).unwrap(),
            DecoyPolicy::None
        );
        assert_eq!(
            DecoyPolicy::from_options(None, true).unwrap(),
            DecoyPolicy::ConnectionDrop
        );
        assert_eq!(
            DecoyPolicy::from_options(Some("1.15.1"), false).unwrap(),
            DecoyPolicy::FakeUpstreamError {
                version: "1.15.1".to_string()
            }
        );
        assert!(DecoyPolicy::from_options(Some("1.15.1"), true).is_err());
        assert!(DecoyPolicy::from_options(Some(""), false).is_err());
    }

    #[test]
    fn test_policy_json_shape() {
        let policy: DecoyPolicy =
            serde_json::from_str(r#"{"kind":"fake_upstream_error","version":"1.15.1"}"#).unwrap();
        assert_eq!(
            policy,
            DecoyPolicy::FakeUpstreamError {
                version: "1.15.1".to_string()
            }
        );
        let policy: DecoyPolicy = serde_json::from_str(r#"{"kind":"connection_drop"}"#).unwrap();
        assert_eq!(policy, DecoyPolicy::ConnectionDrop);
    }
}

//! Knockgate error types.

use thiserror::Error;

/// Errors that can occur while configuring or running a knock gate.
#[derive(Debug, Error)]
pub enum KnockGateError {
    /// Configuration is invalid or has conflicting options.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file could not be read.
    #[error("Config I/O error: {0}")]
    ConfigIO(String),

    /// Notification payload template is not valid JSON.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Transport error delivering a rotation notification.
    #[error("Notification transport error: {0}")]
    NotifyTransport(String),

    /// Notification endpoint answered with a non-success status.
    #[error("Notification rejected with status {status}")]
    NotifyRejected {
        /// HTTP status returned by the notification endpoint.
        status: u16,
    },
}

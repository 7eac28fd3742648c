//! # Knockgate
//!
//! **Port knocking over HTTP paths for Rust.**
//!
//! Knockgate hides a service behind a secret sequence of ordinary-looking
//! HTTP requests. Until the sequence is knocked, every request gets a
//! decoy answer; once it is, requests are forwarded to the hidden target
//! until a close sequence, a timeout or a quota shuts the gate again.
//!
//! ## Features
//!
//! - **Open/close sequences** - ordered path tokens, repeats allowed
//! - **Noise tolerance** - unrelated requests never disturb knock progress
//! - **Auto-close and knock deadlines** - single-occupancy timers per slot
//! - **Session quotas** - limit forwarded requests and WebSocket upgrades
//! - **Decoys** - byte-exact nginx 500 page, or a silent connection drop
//! - **Rotation** - periodically regenerated sequences, announced by webhook
//!
//! ## Quickstart
//!
//! ```no_run
//! use knockgate::{GateConfig, KnockGate, Reply, TargetEndpoint};
//! use reqwest::header::HeaderMap;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), knockgate::KnockGateError> {
//! let mut config = GateConfig::new(
//!     TargetEndpoint::new("localhost", 52256),
//!     vec!["/82".into(), "/delta".into(), "/echo".into()],
//! );
//! config.auto_close = Some(Duration::from_secs(300));
//!
//! let gate = KnockGate::new(config)?;
//!
//! // In the transport layer, for every request:
//! match gate.respond("/82", &HeaderMap::new()).await {
//!     Reply::Forward(target) => { /* pipe the request to target */ }
//!     Reply::Page(page) => { /* write page.to_bytes() */ }
//!     Reply::Drop => { /* close the socket */ }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Threat Model
//!
//! Knockgate makes the hidden service invisible to scanners and casual
//! probing: a closed gate answers exactly like a misconfigured nginx or a
//! dead port. It does **not** protect the knock sequence itself on the
//! wire; without TLS in front, anyone observing traffic can replay it.
//! Rotation limits how long a leaked sequence stays useful.
//!
//! See [`GateConfig`] for all options.

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod timer;

// Protocol layer
pub mod protocol;

// Decoy layer
pub mod decoy;

// Session layer
pub mod policy;

// Notification layer
pub mod client;

// Rotation layer
pub mod rotation;

// Gate (main public API)
pub mod gate;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{GateConfig, RotationConfig, TargetEndpoint, WebhookConfig};
pub use decoy::{DecoyPolicy, DecoyResponder, DecoyResponse};
pub use errors::KnockGateError;
pub use gate::{GateSnapshot, KnockGate};
pub use policy::session::SessionLimiter;
pub use protocol::models::{Action, GateState, HttpReply, Reply};
pub use rotation::rotator::SequenceRotator;
pub use rotation::words::{SyllableWords, WordSource};
pub use rotation::Notifier;
pub use timer::{SingleTimer, TimerSlot};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;

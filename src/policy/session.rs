//! Per-session forwarding quotas.
//!
//! A session exists only while the gate is open. It counts down the
//! forwarded requests and upgrades still allowed; the gate closes once a
//! counter runs out.

/// Remaining forwarding quota for the current open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimiter {
    /// Forwarded HTTP requests left (None = unlimited).
    requests_remaining: Option<u64>,

    /// Forwarded WebSocket upgrades left (None = unlimited).
    upgrades_remaining: Option<u64>,
}

impl SessionLimiter {
    /// Start a session with the configured limits.
    pub fn new(request_limit: Option<u64>, upgrade_limit: Option<u64>) -> Self {
        Self {
            requests_remaining: request_limit,
            upgrades_remaining: upgrade_limit,
        }
    }

    /// Account for one forwarded request.
    ///
    /// Returns `true` when the session is now used up and the gate should
    /// close. The request being consumed is still served.
    pub fn consume_request(&mut self) -> bool {
        consume(&mut self.requests_remaining)
    }

    /// Account for one forwarded WebSocket upgrade.
    ///
    /// Same contract as [`consume_request`](Self::consume_request).
    pub fn consume_upgrade(&mut self) -> bool {
        consume(&mut self.upgrades_remaining)
    }

    /// Requests left, if limited.
    pub fn requests_remaining(&self) -> Option<u64> {
        self.requests_remaining
    }

    /// Upgrades left, if limited.
    pub fn upgrades_remaining(&self) -> Option<u64> {
        self.upgrades_remaining
    }
}

fn consume(counter: &mut Option<u64>) -> bool {
    match counter {
        Some(left) => {
            *left = left.saturating_sub(1);
            *left == 0
        }
        None => false,
    }
}

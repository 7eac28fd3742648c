//! Single-occupancy deferred actions.
//!
//! Each gate timer slot holds at most one pending action. Arming a slot
//! cancels whatever was pending there first. Because a fired task may
//! already be waiting for the gate lock when the slot is cancelled or
//! re-armed, the action receives a [`TimerTicket`] and must
//! [`claim`](SingleTimer::claim) it under the lock before touching state.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The timer slots owned by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    /// Closes an open gate after the configured delay.
    AutoClose,
    /// Resets open-knock progress when the next knock is late.
    MaxInterval,
    /// Drives sequence rotation.
    Rotation,
}

/// Proof that a fired action belongs to a particular arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    slot: TimerSlot,
    generation: u64,
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// A timer slot with at most one pending action.
#[derive(Debug)]
pub struct SingleTimer {
    slot: TimerSlot,
    generation: u64,
    pending: Option<Pending>,
}

impl SingleTimer {
    /// Create an idle timer for `slot`.
    pub fn new(slot: TimerSlot) -> Self {
        Self {
            slot,
            generation: 0,
            pending: None,
        }
    }

    /// Schedule `action` to run after `delay`, replacing any pending action.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, delay: Duration, action: F) -> TimerTicket
    where
        F: FnOnce(TimerTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let ticket = TimerTicket {
            slot: self.slot,
            generation: self.generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action(ticket).await;
        });

        tracing::trace!(slot = ?self.slot, ?delay, "timer armed");
        self.pending = Some(Pending {
            generation: ticket.generation,
            handle,
        });
        ticket
    }

    /// Cancel the pending action, if any. Safe to call at any time.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            tracing::trace!(slot = ?self.slot, "timer cancelled");
        }
    }

    /// Accept a fired action.
    ///
    /// Returns `true` only for the ticket of the current arming, and only
    /// once. Stale tickets (cancelled or re-armed since) return `false` and
    /// the caller must do nothing.
    pub fn claim(&mut self, ticket: TimerTicket) -> bool {
        match &self.pending {
            Some(pending) if ticket.slot == self.slot && pending.generation == ticket.generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for SingleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

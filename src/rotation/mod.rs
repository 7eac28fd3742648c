//! Periodic regeneration of the knock sequences.

pub mod rotator;
pub mod words;

use crate::KnockGateError;

/// Out-of-band delivery of freshly rotated sequences.
///
/// Called on a blocking thread, never with the gate lock held.
pub trait Notifier: Send + Sync {
    /// Announce the new open and close sequences.
    fn notify(&self, open: &[String], close: &[String]) -> Result<(), KnockGateError>;
}

impl<F> Notifier for F
where
    F: Fn(&[String], &[String]) -> Result<(), KnockGateError> + Send + Sync,
{
    fn notify(&self, open: &[String], close: &[String]) -> Result<(), KnockGateError> {
        self(open, close)
    }
}

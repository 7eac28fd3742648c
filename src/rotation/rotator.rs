//! Sequence rotator.
//!
//! Every `interval` the rotator generates a fresh open sequence, uses its
//! reverse as the close sequence, swaps both into the gate and announces
//! them through a [`Notifier`]. The tick reschedules itself on the gate's
//! rotation timer slot. Announcements go through one queue and are
//! delivered one at a time in rotation order. A failed notification is
//! logged and does not undo the swap: the new sequences are authoritative
//! either way.

use super::words::{SyllableWords, WordSource};
use super::Notifier;
use crate::client::webhook::WebhookNotifier;
use crate::config::RotationConfig;
use crate::gate::{GateCore, KnockGate};
use crate::timer::TimerTicket;
use crate::KnockGateError;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

/// Open and close sequences of one rotation.
type Announcement = (Vec<String>, Vec<String>);

struct RotationTask {
    config: RotationConfig,
    words: Mutex<Box<dyn WordSource>>,
    outbox: mpsc::UnboundedSender<Announcement>,
}

impl RotationTask {
    async fn generate(&self) -> Vec<String> {
        let mut words = self.words.lock().await;
        (0..self.config.count)
            .map(|_| format!("/{}", words.word(self.config.min_length, self.config.max_length)))
            .collect()
    }
}

/// Handle to a running rotation schedule.
pub struct SequenceRotator {
    gate: KnockGate,
}

impl SequenceRotator {
    /// Start rotating `gate`'s sequences.
    ///
    /// # Errors
    /// `ConfigError` if the interval, count or length range is invalid.
    pub async fn start(
        config: RotationConfig,
        gate: &KnockGate,
        words: Box<dyn WordSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, KnockGateError> {
        config.validate_schedule()?;
        let rotate_now = config.rotate_on_start;
        let task = Arc::new(RotationTask {
            config,
            words: Mutex::new(words),
            outbox: spawn_delivery(notifier),
        });

        if rotate_now {
            rotate(task, gate.core(), None).await;
        } else {
            let mut core = gate.core().lock().await;
            schedule(&mut core, Arc::downgrade(gate.core()), task);
        }

        info!("sequence rotation started");
        Ok(Self { gate: gate.clone() })
    }

    /// Start rotation with the default word source and the configured webhook.
    ///
    /// # Errors
    /// `ConfigError` if no webhook is configured, `TemplateError` if its
    /// payload template is not valid JSON.
    pub async fn from_config(
        config: RotationConfig,
        gate: &KnockGate,
    ) -> Result<Self, KnockGateError> {
        let webhook = config.webhook.as_ref().ok_or_else(|| {
            KnockGateError::ConfigError(
                "rotation requires a webhook notification target".to_string(),
            )
        })?;
        let notifier = Arc::new(WebhookNotifier::new(webhook)?);
        Self::start(config, gate, Box::new(SyllableWords::new()), notifier).await
    }

    /// Cancel the pending rotation tick.
    pub async fn stop(&self) {
        self.gate.core().lock().await.rotation.cancel();
        info!("sequence rotation stopped");
    }
}

fn schedule(core: &mut GateCore, gate: Weak<Mutex<GateCore>>, task: Arc<RotationTask>) {
    let interval = task.config.interval;
    core.rotation.arm(interval, move |ticket| async move {
        if let Some(gate) = gate.upgrade() {
            rotate(task, &gate, Some(ticket)).await;
        }
    });
}

async fn rotate(
    task: Arc<RotationTask>,
    gate: &Arc<Mutex<GateCore>>,
    ticket: Option<TimerTicket>,
) {
    let (open, close) = {
        let mut core = gate.lock().await;
        if let Some(ticket) = ticket {
            if !core.rotation.claim(ticket) {
                return;
            }
        }

        let open = task.generate().await;
        let close: Vec<String> = open.iter().rev().cloned().collect();
        core.replace_sequences(open.clone(), close.clone());
        schedule(&mut core, Arc::downgrade(gate), Arc::clone(&task));
        (open, close)
    };

    info!(tokens = open.len(), "knock sequences rotated");

    if task.outbox.send((open, close)).is_err() {
        warn!("rotation notification queue closed, announcement dropped");
    }
}

/// Deliver announcements in order, one blocking call at a time.
///
/// The worker ends once the rotation task and its queue are dropped.
fn spawn_delivery(notifier: Arc<dyn Notifier>) -> mpsc::UnboundedSender<Announcement> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Announcement>();
    tokio::spawn(async move {
        while let Some((open, close)) = rx.recv().await {
            let notifier = Arc::clone(&notifier);
            let delivered =
                tokio::task::spawn_blocking(move || notifier.notify(&open, &close)).await;
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(%err, "rotation notification failed, new sequences stay active")
                }
                Err(err) => warn!(%err, "rotation notification task failed"),
            }
        }
    });
    tx
}

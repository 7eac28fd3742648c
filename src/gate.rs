//! Knock gate - the main public API for Knockgate.
//!
//! The `KnockGate` sees every inbound request and upgrade and decides:
//! - whether it advances the open or close sequence
//! - whether it is forwarded to the hidden target
//! - how it is answered otherwise (see [`DecoyResponder`])
//!
//! All state lives behind one lock. Request dispatch, timer callbacks and
//! rotation ticks each hold it for their whole step, so every step sees a
//! consistent gate.

use crate::clock::{Clock, SystemClock};
use crate::config::{GateConfig, TargetEndpoint};
use crate::decoy::{DecoyResponder, DecoyResponse};
use crate::policy::session::SessionLimiter;
use crate::protocol::models::{Action, GateState, HttpReply, Reply};
use crate::protocol::path::normalize_path;
use crate::rotation::rotator::SequenceRotator;
use crate::timer::{SingleTimer, TimerSlot};
use crate::KnockGateError;
use reqwest::header::{HeaderMap, USER_AGENT};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Point-in-time copy of the gate's mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Open or closed.
    pub state: GateState,

    /// Correct open knocks so far.
    pub open_index: usize,

    /// Correct close knocks so far.
    pub close_index: usize,

    /// Active open sequence.
    pub open_sequence: Vec<String>,

    /// Active close sequence.
    pub close_sequence: Vec<String>,

    /// Session quota, present only while open.
    pub session: Option<SessionLimiter>,
}

/// Settings fixed for the lifetime of a gate.
#[derive(Debug)]
struct GateSettings {
    target: TargetEndpoint,
    auto_close: Option<Duration>,
    open_max_interval: Option<Duration>,
    http_request_limit: Option<u64>,
    websocket_upgrade_limit: Option<u64>,
    decoy: DecoyResponder,
}

/// Mutable gate state. Only ever touched with the gate lock held.
#[derive(Debug)]
pub(crate) struct GateCore {
    state: GateState,
    open_index: usize,
    close_index: usize,
    open_sequence: Vec<String>,
    close_sequence: Vec<String>,
    session: Option<SessionLimiter>,
    auto_close: SingleTimer,
    max_interval: SingleTimer,
    pub(crate) rotation: SingleTimer,
}

impl GateCore {
    fn new(open_sequence: Vec<String>, close_sequence: Vec<String>) -> Self {
        Self {
            state: GateState::Closed,
            open_index: 0,
            close_index: 0,
            open_sequence,
            close_sequence,
            session: None,
            auto_close: SingleTimer::new(TimerSlot::AutoClose),
            max_interval: SingleTimer::new(TimerSlot::MaxInterval),
            rotation: SingleTimer::new(TimerSlot::Rotation),
        }
    }

    fn reset_progress(&mut self) {
        self.open_index = 0;
        self.close_index = 0;
    }

    fn open(&mut self, settings: &GateSettings) {
        self.state = GateState::Open;
        self.reset_progress();
        self.session = Some(SessionLimiter::new(
            settings.http_request_limit,
            settings.websocket_upgrade_limit,
        ));
    }

    fn close(&mut self) {
        self.auto_close.cancel();
        self.max_interval.cancel();
        self.state = GateState::Closed;
        self.reset_progress();
        self.session = None;
    }

    /// Swap in new sequences and restart both knock sequences.
    pub(crate) fn replace_sequences(&mut self, open: Vec<String>, close: Vec<String>) {
        self.max_interval.cancel();
        self.open_sequence = open;
        self.close_sequence = close;
        self.reset_progress();
    }

    fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            state: self.state,
            open_index: self.open_index,
            close_index: self.close_index,
            open_sequence: self.open_sequence.clone(),
            close_sequence: self.close_sequence.clone(),
            session: self.session.clone(),
        }
    }

    fn cancel_all(&mut self) {
        self.auto_close.cancel();
        self.max_interval.cancel();
        self.rotation.cancel();
    }
}

/// Port-knocking gate in front of a hidden service.
///
/// Cheap to clone; clones share the same state. Create one per listener.
#[derive(Debug, Clone)]
pub struct KnockGate {
    settings: Arc<GateSettings>,
    core: Arc<Mutex<GateCore>>,
}

impl KnockGate {
    /// Create a closed gate and start everything the configuration asks for.
    ///
    /// When `rotation` is configured, sequences start rotating on the gate's
    /// rotation slot and are announced to the configured webhook. Rotation
    /// runs until [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    /// `ConfigError` or `TemplateError` if the configuration is invalid.
    pub async fn start(config: GateConfig) -> Result<Self, KnockGateError> {
        let rotation = config.rotation.clone();
        let gate = Self::new(config)?;
        if let Some(rotation) = rotation {
            SequenceRotator::from_config(rotation, &gate).await?;
        }
        Ok(gate)
    }

    /// Create a closed gate from the given configuration.
    ///
    /// Uses the system clock for decoy `Date` headers. Does not start
    /// rotation; use [`start`](Self::start) for that.
    ///
    /// # Errors
    /// `ConfigError` if the configuration is invalid or contradictory.
    pub fn new(config: GateConfig) -> Result<Self, KnockGateError> {
        config.validate()?;
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gate with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: GateConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KnockGateError> {
        config.validate()?;
        Self::with_clock(config, clock)
    }

    fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, KnockGateError> {
        let close_sequence = config.effective_close_sequence();
        let decoy = DecoyResponder::with_clock(config.decoy, clock)?;

        let settings = GateSettings {
            target: config.target,
            auto_close: config.auto_close,
            open_max_interval: config.open_max_interval,
            http_request_limit: config.http_request_limit,
            websocket_upgrade_limit: config.websocket_upgrade_limit,
            decoy,
        };

        Ok(Self {
            settings: Arc::new(settings),
            core: Arc::new(Mutex::new(GateCore::new(
                config.open_sequence,
                close_sequence,
            ))),
        })
    }

    /// Decide what to do with one HTTP request.
    ///
    /// `target` is the raw request target (path with optional query, or an
    /// absolute URL). Must be called from within a tokio runtime.
    pub async fn handle_request(&self, target: &str) -> Action {
        let path = normalize_path(target);
        debug!(%path, "request");

        let mut core = self.core.lock().await;
        match core.state {
            GateState::Open => self.dispatch_open(&mut core, &path),
            GateState::Closed => self.dispatch_closed(&mut core, &path),
        }
    }

    fn dispatch_open(&self, core: &mut GateCore, path: &str) -> Action {
        if core.close_sequence[core.close_index] == path {
            core.close_index += 1;
            if core.close_index == core.close_sequence.len() {
                core.close();
                info!("close sequence completed, gate closed");
                return Action::RespondClosed;
            }
            debug!(
                progress = core.close_index,
                total = core.close_sequence.len(),
                "close knock accepted"
            );
            return Action::RespondDecoy;
        }

        let exhausted = core
            .session
            .as_mut()
            .is_some_and(SessionLimiter::consume_request);
        if exhausted {
            core.close();
            info!("request quota used up, gate closed");
        }
        Action::Forward(self.settings.target.clone())
    }

    fn dispatch_closed(&self, core: &mut GateCore, path: &str) -> Action {
        if core.open_sequence[core.open_index] != path {
            return Action::RespondDecoy;
        }

        core.max_interval.cancel();
        core.open_index += 1;

        if core.open_index == core.open_sequence.len() {
            core.open(&self.settings);
            if let Some(delay) = self.settings.auto_close {
                arm_auto_close(core, Arc::downgrade(&self.core), delay);
            }
            info!("open sequence completed, gate opened");
            return Action::RespondOpen;
        }

        if let Some(delay) = self.settings.open_max_interval {
            arm_max_interval(core, Arc::downgrade(&self.core), delay);
        }
        debug!(
            progress = core.open_index,
            total = core.open_sequence.len(),
            "open knock accepted"
        );
        Action::RespondDecoy
    }

    /// Decide what to do with one WebSocket upgrade.
    ///
    /// Upgrades never take part in knocking.
    pub async fn handle_upgrade(&self) -> Action {
        if !self.settings.target.websocket {
            debug!("upgrade rejected, websocket forwarding disabled");
            return Action::RespondDecoy;
        }

        let mut core = self.core.lock().await;
        if core.state == GateState::Closed {
            debug!("upgrade rejected, gate closed");
            return Action::RespondDecoy;
        }

        let exhausted = core
            .session
            .as_mut()
            .is_some_and(SessionLimiter::consume_upgrade);
        if exhausted {
            core.close();
            info!("upgrade quota used up, gate closed");
        }
        Action::Forward(self.settings.target.clone())
    }

    /// Turn a request action into a concrete reply.
    pub fn reply(&self, action: Action, headers: &HeaderMap) -> Reply {
        match action {
            Action::Forward(target) => Reply::Forward(target),
            Action::RespondOpen => Reply::Page(HttpReply::opened()),
            Action::RespondClosed => Reply::Page(HttpReply::closed()),
            Action::RespondDecoy => {
                let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
                match self.settings.decoy.render(user_agent) {
                    DecoyResponse::Empty => Reply::Page(HttpReply::empty()),
                    DecoyResponse::Page(page) => Reply::Page(page),
                    DecoyResponse::Drop => Reply::Drop,
                }
            }
        }
    }

    /// Turn an upgrade action into a concrete reply.
    ///
    /// A rejected upgrade always drops the connection: there is no way to
    /// answer with a page in the middle of a handshake.
    pub fn reply_upgrade(&self, action: Action) -> Reply {
        match action {
            Action::Forward(target) => Reply::Forward(target),
            Action::RespondOpen | Action::RespondClosed | Action::RespondDecoy => Reply::Drop,
        }
    }

    /// Dispatch a request and build its reply in one step.
    pub async fn respond(&self, target: &str, headers: &HeaderMap) -> Reply {
        let action = self.handle_request(target).await;
        self.reply(action, headers)
    }

    /// Dispatch an upgrade and build its reply in one step.
    pub async fn respond_upgrade(&self) -> Reply {
        let action = self.handle_upgrade().await;
        self.reply_upgrade(action)
    }

    /// Current gate state.
    pub async fn state(&self) -> GateState {
        self.core.lock().await.state
    }

    /// Copy of the full mutable state.
    pub async fn snapshot(&self) -> GateSnapshot {
        self.core.lock().await.snapshot()
    }

    /// Hidden service this gate forwards to.
    pub fn target(&self) -> &TargetEndpoint {
        &self.settings.target
    }

    /// Replace both sequences and restart knocking from scratch.
    ///
    /// The gate stays open or closed as it was.
    ///
    /// # Errors
    /// `ConfigError` if either sequence is empty or has an empty path.
    pub async fn replace_sequences(
        &self,
        open: Vec<String>,
        close: Vec<String>,
    ) -> Result<(), KnockGateError> {
        if open.is_empty() || close.is_empty() || open.iter().chain(&close).any(String::is_empty)
        {
            return Err(KnockGateError::ConfigError(
                "replacement sequences must be non-empty paths".to_string(),
            ));
        }
        self.core.lock().await.replace_sequences(open, close);
        Ok(())
    }

    /// Cancel every pending timer, including rotation.
    pub async fn shutdown(&self) {
        self.core.lock().await.cancel_all();
        debug!("gate timers cancelled");
    }

    pub(crate) fn core(&self) -> &Arc<Mutex<GateCore>> {
        &self.core
    }
}

fn arm_auto_close(core: &mut GateCore, gate: Weak<Mutex<GateCore>>, delay: Duration) {
    core.auto_close.arm(delay, move |ticket| async move {
        let Some(gate) = gate.upgrade() else {
            return;
        };
        let mut core = gate.lock().await;
        if core.auto_close.claim(ticket) {
            core.close();
            info!(?delay, "auto-close elapsed, gate closed");
        }
    });
}

fn arm_max_interval(core: &mut GateCore, gate: Weak<Mutex<GateCore>>, delay: Duration) {
    core.max_interval.arm(delay, move |ticket| async move {
        let Some(gate) = gate.upgrade() else {
            return;
        };
        let mut core = gate.lock().await;
        if core.max_interval.claim(ticket) && core.state == GateState::Closed {
            debug!(
                dropped = core.open_index,
                "open knock interval exceeded, progress reset"
            );
            core.open_index = 0;
        }
    });
}

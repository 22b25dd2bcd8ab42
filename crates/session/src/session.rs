// Session trait and the lifecycle bookkeeping shared by every variant

use looptrack_core::{
    AudioError, CallbackEvent, CallbackManager, EventObserver, Pending, Result, SessionState,
    SessionStateContainer,
};
use std::fmt;
use std::sync::Arc;

/// Which playback technique a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A persistent element playing straight to the output
    Element,
    /// One-shot source nodes over a decoded buffer
    DecodedBuffer,
    /// An element wrapped in a graph source node
    ElementGraph,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionKind::Element => "element",
            SessionKind::DecodedBuffer => "decoded-buffer",
            SessionKind::ElementGraph => "element-graph",
        };
        f.write_str(name)
    }
}

/// One variant's playback state and the primitives it owns.
///
/// `play` and `stop` are no-ops until the session is loaded.
pub trait Session: Send + Sync {
    fn kind(&self) -> SessionKind;

    /// Start loading. `None` when there is nothing to do: a load is already
    /// in flight, the session is already loaded, or it has no element.
    fn load(&self) -> Option<Pending<()>>;

    fn play(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn state(&self) -> SessionState;

    fn is_loaded(&self) -> bool {
        self.state().loaded()
    }

    fn is_playing(&self) -> bool {
        self.state().playing()
    }

    /// Transport position in seconds, for variants that have one
    fn position(&self) -> Option<f64> {
        None
    }

    fn add_observer(&self, observer: Arc<dyn EventObserver>);
}

/// State container plus the observers that hear about its changes
#[derive(Clone)]
pub(crate) struct Lifecycle {
    kind: SessionKind,
    state: SessionStateContainer,
    callbacks: CallbackManager,
}

impl Lifecycle {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            state: SessionStateContainer::new(),
            callbacks: CallbackManager::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get_state()
    }

    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.callbacks.add_observer(observer);
    }

    /// Observer that forwards context and element events to this session's
    /// observers
    pub fn relay(&self) -> Arc<dyn EventObserver> {
        Arc::new(Relay(self.callbacks.clone()))
    }

    /// Claim the load slot; false if a load already ran or is running
    pub fn begin_load(&self) -> bool {
        if !self.state.begin_load() {
            log::debug!("[{}] load ignored while {}", self.kind, self.state());
            return false;
        }
        log::info!("[{}] loading", self.kind);
        self.notify(SessionState::Unloaded, SessionState::Loading);
        true
    }

    pub fn advance(&self, to: SessionState) -> Result<()> {
        let from = self.state.transition(to)?;
        self.notify(from, to);
        Ok(())
    }

    /// True when play/stop may act. Logs the ignored action otherwise.
    pub fn accepts(&self, action: &str) -> bool {
        let state = self.state();
        if !state.loaded() {
            log::debug!("[{}] {} ignored while {}", self.kind, action, state);
        }
        state.loaded()
    }

    /// Return to `Unloaded` so the load can be retried
    pub fn fail_load(&self, error: &AudioError) {
        log::warn!("[{}] load failed: {}", self.kind, error);
        if let Err(e) = self.advance(SessionState::Unloaded) {
            log::debug!("[{}] {}", self.kind, e);
        }
        self.callbacks.dispatch_event(CallbackEvent::LoadFailed {
            message: error.to_string(),
        });
    }

    /// Settle a finished load and hand back its outcome
    pub fn finish_load(&self, result: Result<()>) -> Result<()> {
        match result.and_then(|()| self.advance(SessionState::Loaded)) {
            Ok(()) => {
                log::info!("[{}] loaded", self.kind);
                Ok(())
            }
            Err(e) => {
                self.fail_load(&e);
                Err(e)
            }
        }
    }

    fn notify(&self, old_state: SessionState, new_state: SessionState) {
        self.callbacks.dispatch_event(CallbackEvent::StateChanged {
            old_state,
            new_state,
        });
    }
}

struct Relay(CallbackManager);

impl EventObserver for Relay {
    fn on_event(&self, event: CallbackEvent) {
        self.0.dispatch_event(event);
    }
}

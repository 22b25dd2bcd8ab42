// Event callbacks for sessions, graph nodes and media elements
// Observers are the only way state leaves a session; the UI subscribes here.

use crate::state::SessionState;
use parking_lot::Mutex;
use std::sync::Arc;

/// Events published by sessions, audio contexts and media elements
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    /// Session lifecycle changed
    StateChanged {
        old_state: SessionState,
        new_state: SessionState,
    },

    /// A session load failed and the session went back to unloaded
    LoadFailed { message: String },

    /// A source node started producing audio
    NodeStarted { node_id: u64 },

    /// A source node stopped, explicitly or by reaching the end of its buffer
    NodeStopped { node_id: u64 },

    /// A media element began fetching its source
    MediaLoadStart,

    /// A media element finished loading and can play
    MediaReady { duration_secs: f64 },

    /// A media element failed to load its source
    MediaError { message: String },
}

/// Event observer trait
/// Implementations should be lightweight and non-blocking, events may be
/// delivered from a loader or audio thread
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: CallbackEvent);
}

/// Fan-out of events to every registered observer
#[derive(Clone)]
pub struct CallbackManager {
    observers: Arc<Mutex<Vec<Arc<dyn EventObserver>>>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn dispatch_event(&self, event: CallbackEvent) {
        // Snapshot so observers may register further observers without deadlocking
        let observers = self.observers.lock().clone();
        for observer in observers.iter() {
            observer.on_event(event.clone());
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer that keeps every event it sees, in order
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<CallbackEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&CallbackEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Every `new_state` reported by a `StateChanged` event
    pub fn state_trail(&self) -> Vec<SessionState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                CallbackEvent::StateChanged { new_state, .. } => Some(*new_state),
                _ => None,
            })
            .collect()
    }
}

impl EventObserver for EventRecorder {
    fn on_event(&self, event: CallbackEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_every_observer() {
        let first = Arc::new(EventRecorder::new());
        let second = Arc::new(EventRecorder::new());
        let manager = CallbackManager::new();
        manager.add_observer(first.clone());
        manager.add_observer(second.clone());

        manager.dispatch_event(CallbackEvent::NodeStarted { node_id: 7 });

        assert_eq!(first.events(), vec![CallbackEvent::NodeStarted { node_id: 7 }]);
        assert_eq!(second.events().len(), 1);
    }

    #[test]
    fn test_state_trail() {
        let recorder = EventRecorder::new();
        recorder.on_event(CallbackEvent::StateChanged {
            old_state: SessionState::Unloaded,
            new_state: SessionState::Loading,
        });
        recorder.on_event(CallbackEvent::NodeStopped { node_id: 1 });
        recorder.on_event(CallbackEvent::StateChanged {
            old_state: SessionState::Loading,
            new_state: SessionState::Loaded,
        });

        assert_eq!(
            recorder.state_trail(),
            vec![SessionState::Loading, SessionState::Loaded]
        );
        assert_eq!(
            recorder.count(|e| matches!(e, CallbackEvent::NodeStopped { .. })),
            1
        );
    }
}

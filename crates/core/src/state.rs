// Session lifecycle state management

use crate::error::{AudioError, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet, or the last load failed
    Unloaded,
    /// A load is in flight
    Loading,
    /// The track is ready to play
    Loaded,
    /// The track is playing
    Playing,
}

impl SessionState {
    /// True once the track has been fetched and decoded/attached
    pub fn loaded(self) -> bool {
        matches!(self, SessionState::Loaded | SessionState::Playing)
    }

    pub fn playing(self) -> bool {
        self == SessionState::Playing
    }

    /// Whether the lifecycle permits moving from `self` to `to`
    pub fn can_transition_to(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Unloaded, Loading)
                | (Loading, Loaded)
                // load failed
                | (Loading, Unloaded)
                | (Loaded, Playing)
                // replay
                | (Playing, Playing)
                | (Playing, Loaded)
                | (Loaded, Loaded)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unloaded => "unloaded",
            SessionState::Loading => "loading",
            SessionState::Loaded => "loaded",
            SessionState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Thread-safe session state container
#[derive(Clone)]
pub struct SessionStateContainer {
    state: Arc<RwLock<SessionState>>,
}

impl SessionStateContainer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Unloaded)),
        }
    }

    pub fn get_state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_loaded(&self) -> bool {
        self.get_state().loaded()
    }

    pub fn is_playing(&self) -> bool {
        self.get_state().playing()
    }

    /// Apply a validated transition and return the previous state
    pub fn transition(&self, to: SessionState) -> Result<SessionState> {
        let mut state = self.state.write();
        let from = *state;
        if !from.can_transition_to(to) {
            return Err(AudioError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )));
        }
        *state = to;
        log::debug!("Session state changed: {} -> {}", from, to);
        Ok(from)
    }

    /// Atomically claim the load slot.
    ///
    /// Returns `false` when a load is already in flight or has completed, so
    /// a second `load()` can back off without side effects.
    pub fn begin_load(&self) -> bool {
        let mut state = self.state.write();
        if *state != SessionState::Unloaded {
            return false;
        }
        *state = SessionState::Loading;
        log::debug!("Session state changed: unloaded -> loading");
        true
    }
}

impl Default for SessionStateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let state = SessionStateContainer::new();
        assert!(state.begin_load());
        assert_eq!(state.transition(SessionState::Loaded), Ok(SessionState::Loading));
        assert!(state.is_loaded());
        assert!(!state.is_playing());

        state.transition(SessionState::Playing).unwrap();
        state.transition(SessionState::Playing).unwrap();
        assert!(state.is_playing());

        state.transition(SessionState::Loaded).unwrap();
        assert_eq!(state.get_state(), SessionState::Loaded);
    }

    #[test]
    fn test_loaded_never_resets() {
        let state = SessionStateContainer::new();
        assert!(state.begin_load());
        state.transition(SessionState::Loaded).unwrap();

        assert!(state.transition(SessionState::Unloaded).is_err());
        assert!(state.transition(SessionState::Loading).is_err());
        assert!(!state.begin_load());
        assert!(state.is_loaded());
    }

    #[test]
    fn test_play_requires_loaded() {
        let state = SessionStateContainer::new();
        assert!(state.transition(SessionState::Playing).is_err());

        assert!(state.begin_load());
        assert!(state.transition(SessionState::Playing).is_err());
        assert_eq!(state.get_state(), SessionState::Loading);
    }

    #[test]
    fn test_second_begin_load_is_rejected() {
        let state = SessionStateContainer::new();
        assert!(state.begin_load());
        assert!(!state.begin_load());

        // A failed load frees the slot again
        state.transition(SessionState::Unloaded).unwrap();
        assert!(state.begin_load());
    }
}

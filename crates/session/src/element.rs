// Variant 1: a mounted element with its own transport

use crate::platform::Platform;
use crate::session::{Lifecycle, Session, SessionKind};
use looptrack_core::{pending, EventObserver, Pending, Result, SessionState};
use looptrack_graph::MediaElement;
use std::sync::Arc;

/// Plays through a persistent element whose source is set once and reused
pub struct ElementSession {
    src: String,
    element: Option<MediaElement>,
    lifecycle: Lifecycle,
}

impl ElementSession {
    /// Mount an element from `platform`. If mounting fails the session keeps
    /// no element and every operation is a no-op.
    pub fn new(platform: &dyn Platform, src: impl Into<String>) -> Self {
        let element = match platform.mount_element() {
            Ok(element) => Some(element),
            Err(e) => {
                log::warn!("[element] no element mounted: {}", e);
                None
            }
        };
        Self::with_element(element, src)
    }

    pub fn with_element(element: Option<MediaElement>, src: impl Into<String>) -> Self {
        let lifecycle = Lifecycle::new(SessionKind::Element);
        if let Some(element) = &element {
            element.add_observer(lifecycle.relay());
        }
        Self {
            src: src.into(),
            element,
            lifecycle,
        }
    }

    pub fn element(&self) -> Option<&MediaElement> {
        self.element.as_ref()
    }

    fn mounted(&self, action: &str) -> Option<&MediaElement> {
        if self.element.is_none() {
            log::debug!("[element] {} ignored, no element mounted", action);
        }
        self.element.as_ref()
    }
}

impl Session for ElementSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Element
    }

    fn load(&self) -> Option<Pending<()>> {
        let element = self.mounted("load")?;
        if !self.lifecycle.begin_load() {
            return None;
        }

        element.set_src(self.src.clone());
        let (completer, pending) = pending();
        let lifecycle = self.lifecycle.clone();
        element.load_with(move |result| completer.complete(lifecycle.finish_load(result)));
        Some(pending)
    }

    fn play(&self) -> Result<()> {
        let Some(element) = self.mounted("play") else {
            return Ok(());
        };
        if !self.lifecycle.accepts("play") {
            return Ok(());
        }
        // Only claim playback once the element actually accepted it
        element.play()?;
        self.lifecycle.advance(SessionState::Playing)
    }

    fn stop(&self) -> Result<()> {
        let Some(element) = self.mounted("stop") else {
            return Ok(());
        };
        if !self.lifecycle.accepts("stop") {
            return Ok(());
        }
        element.pause();
        element.set_current_time(0.0);
        self.lifecycle.advance(SessionState::Loaded)
    }

    fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    fn position(&self) -> Option<f64> {
        self.element.as_ref().map(|element| element.current_time())
    }

    fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.lifecycle.add_observer(observer);
    }
}

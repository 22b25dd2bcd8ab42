// Variant 3: an element routed through a graph source node

use crate::platform::Platform;
use crate::session::{Lifecycle, Session, SessionKind};
use looptrack_core::{pending, EventObserver, Pending, Result, SessionState};
use looptrack_graph::{AudioContext, AudioNode, MediaElement, MediaElementSourceNode};
use parking_lot::Mutex;
use std::sync::Arc;

struct GraphInner {
    platform: Arc<dyn Platform>,
    src: String,
    gain: f32,
    lifecycle: Lifecycle,
    context: Mutex<Option<AudioContext>>,
    /// Holds the element; transport goes through `media_element()`
    node: Mutex<Option<MediaElementSourceNode>>,
}

/// Owns a private element, only reachable through the graph node wrapping it
pub struct GraphSession {
    inner: Arc<GraphInner>,
}

impl GraphSession {
    pub fn new(platform: Arc<dyn Platform>, src: impl Into<String>, gain: f32) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                platform,
                src: src.into(),
                gain,
                lifecycle: Lifecycle::new(SessionKind::ElementGraph),
                context: Mutex::new(None),
                node: Mutex::new(None),
            }),
        }
    }

    pub fn context(&self) -> Option<AudioContext> {
        self.inner.context.lock().clone()
    }

    fn with_element<R>(&self, action: &str, f: impl FnOnce(&MediaElement) -> R) -> Option<R> {
        let node = self.inner.node.lock();
        match node.as_ref() {
            Some(node) => Some(f(node.media_element())),
            None => {
                log::debug!("[element-graph] {} ignored, no source node", action);
                None
            }
        }
    }
}

impl GraphInner {
    /// Wrap the loaded element and route it source -> gain -> destination
    fn attach(&self, context: &AudioContext, element: &MediaElement) -> Result<()> {
        let node = context.create_media_element_source(element)?;
        let gain = context.create_gain();
        gain.set_gain(self.gain);
        node.connect(&gain)?.connect(&context.destination())?;
        *self.node.lock() = Some(node);
        Ok(())
    }

    fn complete_load(
        &self,
        context: &AudioContext,
        element: &MediaElement,
        result: Result<()>,
    ) -> Result<()> {
        let result = result.and_then(|()| self.attach(context, element));
        if result.is_err() {
            if let Some(context) = self.context.lock().take() {
                if let Err(e) = context.close() {
                    log::warn!("[element-graph] failed to close context: {}", e);
                }
            }
        }
        self.lifecycle.finish_load(result)
    }
}

impl Session for GraphSession {
    fn kind(&self) -> SessionKind {
        SessionKind::ElementGraph
    }

    fn load(&self) -> Option<Pending<()>> {
        if self.inner.context.lock().is_some() {
            log::debug!("[element-graph] load ignored, already initialized");
            return None;
        }
        if !self.inner.lifecycle.begin_load() {
            return None;
        }

        let context = match self.inner.platform.create_context() {
            Ok(context) => context,
            Err(e) => return Some(Pending::ready(self.inner.lifecycle.finish_load(Err(e)))),
        };
        context.add_observer(self.inner.lifecycle.relay());
        *self.inner.context.lock() = Some(context.clone());

        let element = MediaElement::new(self.inner.platform.fetcher(), context.spec());
        element.add_observer(self.inner.lifecycle.relay());
        element.set_src(self.inner.src.clone());
        element.set_loop(true);

        let (completer, pending) = pending();
        let inner = self.inner.clone();
        let loaded = element.clone();
        element.load_with(move |result| {
            completer.complete(inner.complete_load(&context, &loaded, result));
        });
        Some(pending)
    }

    fn play(&self) -> Result<()> {
        if !self.inner.lifecycle.accepts("play") {
            return Ok(());
        }
        match self.with_element("play", |element| element.play()) {
            Some(result) => {
                result?;
                self.inner.lifecycle.advance(SessionState::Playing)
            }
            None => Ok(()),
        }
    }

    fn stop(&self) -> Result<()> {
        if !self.inner.lifecycle.accepts("stop") {
            return Ok(());
        }
        let stopped = self.with_element("stop", |element| {
            element.pause();
            element.set_current_time(0.0);
        });
        match stopped {
            Some(()) => self.inner.lifecycle.advance(SessionState::Loaded),
            None => Ok(()),
        }
    }

    fn state(&self) -> SessionState {
        self.inner.lifecycle.state()
    }

    fn position(&self) -> Option<f64> {
        self.inner
            .node
            .lock()
            .as_ref()
            .map(|node| node.media_element().current_time())
    }

    fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.inner.lifecycle.add_observer(observer);
    }
}

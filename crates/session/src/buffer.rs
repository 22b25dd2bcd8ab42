// Variant 2: decoded buffer played through one-shot source nodes

use crate::platform::Platform;
use crate::session::{Lifecycle, Session, SessionKind};
use looptrack_core::{pending, AudioError, EventObserver, Pending, Result, SessionState};
use looptrack_graph::{AudioBuffer, AudioContext, AudioNode, BufferSourceNode, GainNode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

struct Routing {
    context: AudioContext,
    gain: GainNode,
    buffer: Option<AudioBuffer>,
}

struct BufferInner {
    platform: Arc<dyn Platform>,
    src: String,
    gain: f32,
    lifecycle: Lifecycle,
    routing: Mutex<Option<Routing>>,
    /// Node from the latest play; kept after it is stopped
    current: Mutex<Option<BufferSourceNode>>,
    /// Serializes play and stop. Never held with the locks above.
    transport: Mutex<()>,
}

/// Decodes the track once, then starts a fresh looping source node for
/// every play
pub struct BufferSession {
    inner: Arc<BufferInner>,
}

impl BufferSession {
    pub fn new(platform: Arc<dyn Platform>, src: impl Into<String>, gain: f32) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                platform,
                src: src.into(),
                gain,
                lifecycle: Lifecycle::new(SessionKind::DecodedBuffer),
                routing: Mutex::new(None),
                current: Mutex::new(None),
                transport: Mutex::new(()),
            }),
        }
    }

    pub fn context(&self) -> Option<AudioContext> {
        self.inner
            .routing
            .lock()
            .as_ref()
            .map(|routing| routing.context.clone())
    }

    pub fn buffer(&self) -> Option<AudioBuffer> {
        self.inner
            .routing
            .lock()
            .as_ref()
            .and_then(|routing| routing.buffer.clone())
    }

    /// The node started by the latest play, even once it is stopped
    pub fn current_node(&self) -> Option<BufferSourceNode> {
        self.inner.current.lock().clone()
    }
}

impl BufferInner {
    /// Context plus the gain stage every source node is routed through
    fn open_routing(&self) -> Result<Routing> {
        let context = self.platform.create_context()?;
        context.add_observer(self.lifecycle.relay());
        let gain = context.create_gain();
        gain.set_gain(self.gain);
        gain.connect(&context.destination())?;
        Ok(Routing {
            context,
            gain,
            buffer: None,
        })
    }

    fn fetch_and_decode(&self, context: &AudioContext) -> Result<AudioBuffer> {
        let bytes = self.platform.fetcher().fetch(&self.src)?;
        context.decode_audio_data(bytes, &self.src)
    }

    fn complete_load(&self, context: AudioContext) -> Result<()> {
        let result = self.fetch_and_decode(&context).map(|buffer| {
            if let Some(routing) = self.routing.lock().as_mut() {
                routing.buffer = Some(buffer);
            }
        });
        if result.is_err() {
            self.discard_routing();
        }
        self.lifecycle.finish_load(result)
    }

    /// Context, gain stage and buffer, once a load has finished
    fn playable(&self) -> Option<(AudioContext, GainNode, AudioBuffer)> {
        let routing = self.routing.lock();
        let routing = routing.as_ref()?;
        let buffer = routing.buffer.clone()?;
        Some((routing.context.clone(), routing.gain.clone(), buffer))
    }

    fn start_source(
        &self,
        context: &AudioContext,
        gain: &GainNode,
        buffer: AudioBuffer,
    ) -> Result<BufferSourceNode> {
        let node = context.create_buffer_source();
        let duration = buffer.duration();
        let started = node
            .set_buffer(buffer)
            .and_then(|_| node.set_loop(true))
            .and_then(|_| node.set_loop_start(0.0))
            .and_then(|_| node.set_loop_end(duration))
            .and_then(|_| node.connect(gain).map(|_| ()))
            .and_then(|_| node.start());

        if let Err(e) = started {
            if let Err(discard) = node.discard() {
                log::warn!(
                    "[decoded-buffer] failed to discard source {}: {}",
                    node.id(),
                    discard
                );
            }
            return Err(e);
        }
        Ok(node)
    }

    fn discard_routing(&self) {
        if let Some(routing) = self.routing.lock().take() {
            if let Err(e) = routing.context.close() {
                log::warn!("[decoded-buffer] failed to close context: {}", e);
            }
        }
    }
}

impl Session for BufferSession {
    fn kind(&self) -> SessionKind {
        SessionKind::DecodedBuffer
    }

    fn load(&self) -> Option<Pending<()>> {
        if self.inner.routing.lock().is_some() {
            log::debug!("[decoded-buffer] load ignored, context already exists");
            return None;
        }
        if !self.inner.lifecycle.begin_load() {
            return None;
        }

        let routing = match self.inner.open_routing() {
            Ok(routing) => routing,
            Err(e) => return Some(Pending::ready(self.inner.lifecycle.finish_load(Err(e)))),
        };
        let context = routing.context.clone();
        *self.inner.routing.lock() = Some(routing);

        let (completer, pending) = pending();
        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name("looptrack-buffer-load".to_string())
            .spawn(move || completer.complete(inner.complete_load(context)));

        if let Err(e) = spawned {
            self.inner.discard_routing();
            let error = AudioError::InitializationError(format!("loader thread: {}", e));
            return Some(Pending::ready(self.inner.lifecycle.finish_load(Err(error))));
        }
        Some(pending)
    }

    fn play(&self) -> Result<()> {
        if !self.inner.lifecycle.accepts("play") {
            return Ok(());
        }
        let _transport = self.inner.transport.lock();
        let Some((context, gain, buffer)) = self.inner.playable() else {
            log::debug!("[decoded-buffer] play ignored, no buffer");
            return Ok(());
        };

        if self.inner.lifecycle.state().playing() {
            // Source nodes cannot restart; retire the old one first
            let previous = self.inner.current.lock().clone();
            if let Some(node) = previous {
                node.stop()?;
            }
        }

        let node = self.inner.start_source(&context, &gain, buffer)?;
        log::info!("[decoded-buffer] started source {}", node.id());

        *self.inner.current.lock() = Some(node);
        self.inner.lifecycle.advance(SessionState::Playing)
    }

    fn stop(&self) -> Result<()> {
        if !self.inner.lifecycle.accepts("stop") {
            return Ok(());
        }
        let _transport = self.inner.transport.lock();
        let current = self.inner.current.lock().clone();
        if let Some(node) = current {
            node.stop()?;
        }
        self.inner.lifecycle.advance(SessionState::Loaded)
    }

    fn state(&self) -> SessionState {
        self.inner.lifecycle.state()
    }

    fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.inner.lifecycle.add_observer(observer);
    }
}

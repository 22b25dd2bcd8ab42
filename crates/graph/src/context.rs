// Audio context: owns the graph and drives it from an output device or by hand

use crate::buffer::{decode_to_buffer, AudioBuffer};
use crate::element::MediaElement;
use crate::graph::{Graph, NodeKind};
use crate::node::{BufferSourceNode, DestinationNode, GainNode, MediaElementSourceNode};
use looptrack_core::{CallbackManager, EventObserver, Result};
use looptrack_renderer_api::{AudioRenderer, AudioSpec};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

struct ContextShared {
    id: u64,
    spec: AudioSpec,
    graph: Mutex<Graph>,
    callbacks: CallbackManager,
    closed: AtomicBool,
}

impl ContextShared {
    fn render(&self, out: &mut [f32]) {
        let events = {
            let mut graph = self.graph.lock();
            graph.render(out);
            graph.take_events()
        };
        for event in events {
            self.callbacks.dispatch_event(event);
        }
    }
}

/// Handle to an audio graph and, optionally, the device rendering it.
///
/// Clones share the same graph. The output device is released when the last
/// handle (including node handles) is dropped, or on `close()`.
#[derive(Clone)]
pub struct AudioContext {
    shared: Arc<ContextShared>,
    output: Arc<Mutex<Option<Box<dyn AudioRenderer>>>>,
}

impl AudioContext {
    /// A context with no device; call `render` to pull audio
    pub fn offline(spec: AudioSpec) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Creating audio context {} ({} Hz, {} ch)",
            id,
            spec.sample_rate,
            spec.channels
        );
        Self {
            shared: Arc::new(ContextShared {
                id,
                spec,
                graph: Mutex::new(Graph::new(spec)),
                callbacks: CallbackManager::new(),
                closed: AtomicBool::new(false),
            }),
            output: Arc::new(Mutex::new(None)),
        }
    }

    /// A context rendered by `renderer`, running at the renderer's format
    pub fn with_renderer(mut renderer: Box<dyn AudioRenderer>) -> Result<Self> {
        let context = Self::offline(renderer.spec());

        // The device callback must not keep the graph alive
        let weak: Weak<ContextShared> = Arc::downgrade(&context.shared);
        renderer.set_audio_callback(Box::new(move |data: &mut [f32]| match weak.upgrade() {
            Some(shared) => {
                shared.render(data);
                data.len()
            }
            None => 0,
        }))?;
        renderer.start()?;

        *context.output.lock() = Some(renderer);
        Ok(context)
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn spec(&self) -> AudioSpec {
        self.shared.spec
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.spec.sample_rate
    }

    pub fn same_context(&self, other: &AudioContext) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn is_running(&self) -> bool {
        self.output
            .lock()
            .as_ref()
            .map(|renderer| renderer.is_playing())
            .unwrap_or(false)
    }

    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.shared.callbacks.add_observer(observer);
    }

    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        f(&mut self.shared.graph.lock())
    }

    /// Dispatch events raised outside of `render` (start/stop calls)
    pub(crate) fn flush_events(&self) {
        let events = self.shared.graph.lock().take_events();
        for event in events {
            self.shared.callbacks.dispatch_event(event);
        }
    }

    pub fn destination(&self) -> DestinationNode {
        DestinationNode {
            id: self.with_graph(|graph| graph.destination()),
            context: self.clone(),
        }
    }

    pub fn create_buffer_source(&self) -> BufferSourceNode {
        BufferSourceNode {
            id: self.with_graph(|graph| graph.add_buffer_source()),
            context: self.clone(),
        }
    }

    pub fn create_gain(&self) -> GainNode {
        GainNode {
            id: self.with_graph(|graph| graph.add_node(NodeKind::Gain { gain: 1.0 })),
            context: self.clone(),
        }
    }

    /// Wrap `element` so its output flows through this graph. An element can
    /// be wrapped only once.
    pub fn create_media_element_source(
        &self,
        element: &MediaElement,
    ) -> Result<MediaElementSourceNode> {
        element.capture()?;
        let id = self.with_graph(|graph| graph.add_node(NodeKind::ElementSource(element.clone())));
        Ok(MediaElementSourceNode {
            id,
            context: self.clone(),
            element: element.clone(),
        })
    }

    /// Decode an encoded asset into a buffer in this context's format.
    /// `name` is only used as a container hint (its extension).
    pub fn decode_audio_data(&self, bytes: Vec<u8>, name: &str) -> Result<AudioBuffer> {
        let buffer = decode_to_buffer(bytes, name, self.spec())?;
        log::info!(
            "Context {} decoded {:.2}s of audio",
            self.id(),
            buffer.duration()
        );
        Ok(buffer)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Render one interleaved block by hand (offline contexts)
    pub fn render(&self, out: &mut [f32]) {
        self.shared.render(out);
    }

    /// Number of buffer sources currently started
    pub fn active_source_count(&self) -> usize {
        self.with_graph(|graph| graph.active_source_count())
    }

    pub fn node_count(&self) -> usize {
        self.with_graph(|graph| graph.node_count())
    }

    /// Release the output device and mark the context closed. The graph
    /// stays usable for manual rendering.
    pub fn close(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(mut renderer) = self.output.lock().take() {
            log::info!("Closing audio context {}", self.id());
            renderer.stop()?;
            renderer.release()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AudioNode, SourceState};
    use looptrack_core::{CallbackEvent, EventRecorder};
    use looptrack_renderer_api::AudioCallback;

    fn tone_buffer(context: &AudioContext, frames: usize) -> AudioBuffer {
        let channels = context.spec().channels as usize;
        AudioBuffer::from_interleaved(
            vec![0.5; frames * channels],
            context.sample_rate(),
            context.spec().channels,
        )
    }

    #[test]
    fn test_source_gain_destination_chain() {
        let context = AudioContext::offline(AudioSpec::new(100, 2));
        let source = context.create_buffer_source();
        let gain = context.create_gain();
        gain.set_gain(0.5);

        source.set_buffer(tone_buffer(&context, 10)).unwrap();
        source.set_loop(true).unwrap();
        source
            .connect(&gain)
            .unwrap()
            .connect(&context.destination())
            .unwrap();
        source.start().unwrap();

        let mut out = vec![0.0; 8];
        context.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_start_stop_events() {
        let context = AudioContext::offline(AudioSpec::new(100, 1));
        let recorder = Arc::new(EventRecorder::new());
        context.add_observer(recorder.clone());

        let source = context.create_buffer_source();
        source.set_buffer(tone_buffer(&context, 10)).unwrap();
        source.start().unwrap();
        source.stop().unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                CallbackEvent::NodeStarted {
                    node_id: source.id().as_u64()
                },
                CallbackEvent::NodeStopped {
                    node_id: source.id().as_u64()
                },
            ]
        );
        assert_eq!(source.state(), SourceState::Stopped);
        assert!(source.start().is_err());
        assert!(source.set_loop(true).is_err());
    }

    #[test]
    fn test_discarded_source_leaves_graph() {
        let context = AudioContext::offline(AudioSpec::new(100, 1));
        let before = context.node_count();

        let source = context.create_buffer_source();
        source.connect(&context.destination()).unwrap();
        assert_eq!(context.node_count(), before + 1);

        source.discard().unwrap();
        assert_eq!(context.node_count(), before);
        assert_eq!(source.state(), SourceState::Stopped);
    }

    #[test]
    fn test_close_marks_clones_closed() {
        let context = AudioContext::offline(AudioSpec::default());
        let clone = context.clone();
        assert!(!clone.is_closed());

        context.close().unwrap();
        assert!(clone.is_closed());
        context.close().unwrap();
    }

    #[test]
    fn test_cross_context_connect_is_rejected() {
        let a = AudioContext::offline(AudioSpec::default());
        let b = AudioContext::offline(AudioSpec::default());
        let gain = a.create_gain();
        assert!(gain.connect(&b.destination()).is_err());
        assert!(!a.same_context(&b));
        assert!(a.same_context(&a.clone()));
    }

    #[test]
    fn test_loop_bounds_are_kept() {
        let context = AudioContext::offline(AudioSpec::new(100, 1));
        let source = context.create_buffer_source();
        let buffer = tone_buffer(&context, 250);
        source.set_loop_start(0.0).unwrap();
        source.set_loop_end(buffer.duration()).unwrap();
        assert_eq!(source.loop_bounds(), Some((0.0, 2.5)));
    }

    struct ManualRenderer {
        spec: AudioSpec,
        callback: Arc<Mutex<Option<AudioCallback>>>,
        playing: bool,
    }

    impl AudioRenderer for ManualRenderer {
        fn start(&mut self) -> Result<()> {
            self.playing = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.playing = false;
            Ok(())
        }

        fn set_audio_callback(&mut self, callback: AudioCallback) -> Result<()> {
            *self.callback.lock() = Some(callback);
            Ok(())
        }

        fn spec(&self) -> AudioSpec {
            self.spec
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn release(&mut self) -> Result<()> {
            self.callback.lock().take();
            Ok(())
        }
    }

    #[test]
    fn test_renderer_pulls_graph() {
        let callback = Arc::new(Mutex::new(None));
        let renderer = ManualRenderer {
            spec: AudioSpec::new(100, 1),
            callback: callback.clone(),
            playing: false,
        };
        let context = AudioContext::with_renderer(Box::new(renderer)).unwrap();
        assert!(context.is_running());

        let source = context.create_buffer_source();
        source.set_buffer(tone_buffer(&context, 4)).unwrap();
        source.set_loop(true).unwrap();
        source.connect(&context.destination()).unwrap();
        source.start().unwrap();

        let mut out = vec![0.0; 4];
        let written = (callback.lock().as_mut().unwrap())(&mut out);
        assert_eq!(written, 4);
        assert_eq!(out, vec![0.5; 4]);

        context.close().unwrap();
        assert!(!context.is_running());
        assert!(callback.lock().is_none());
    }
}

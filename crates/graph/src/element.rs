// Streaming-style media element: a persistent player with its own transport

use crate::buffer::{decode_to_buffer, AudioBuffer};
use looptrack_core::{
    pending, AudioError, CallbackEvent, CallbackManager, EventObserver, Pending, Result,
};
use looptrack_renderer_api::AudioSpec;
use looptrack_transport_http::Fetcher;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// How far an element's media has loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// No source, or source not loaded yet
    Empty,
    Loading,
    Ready,
    Failed,
}

struct ElementState {
    src: Option<String>,
    looping: bool,
    paused: bool,
    /// Playback position in frames
    position: usize,
    media: Option<AudioBuffer>,
    ready: ReadyState,
}

struct ElementInner {
    spec: AudioSpec,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<ElementState>,
    callbacks: CallbackManager,
    captured: AtomicBool,
    generation: AtomicU64,
}

/// A media element. Unlike a buffer source it can be paused, resumed and
/// seeked, and it is reused for the whole session.
///
/// An element makes no sound by itself; route it into a context with
/// `AudioContext::create_media_element_source`.
#[derive(Clone)]
pub struct MediaElement {
    inner: Arc<ElementInner>,
}

impl MediaElement {
    /// `spec` is the layout media is decoded into; use the spec of the
    /// context the element will be routed through.
    pub fn new(fetcher: Arc<dyn Fetcher>, spec: AudioSpec) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                spec,
                fetcher,
                state: Mutex::new(ElementState {
                    src: None,
                    looping: false,
                    paused: true,
                    position: 0,
                    media: None,
                    ready: ReadyState::Empty,
                }),
                callbacks: CallbackManager::new(),
                captured: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the source. Drops loaded media and pauses.
    pub fn set_src(&self, src: impl Into<String>) {
        let src = src.into();
        log::debug!("Media element source set to {}", src);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.inner.state.lock();
        state.src = Some(src);
        state.media = None;
        state.position = 0;
        state.paused = true;
        state.ready = ReadyState::Empty;
    }

    pub fn src(&self) -> Option<String> {
        self.inner.state.lock().src.clone()
    }

    pub fn set_loop(&self, looping: bool) {
        self.inner.state.lock().looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.inner.state.lock().looping
    }

    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) {
        self.inner.callbacks.add_observer(observer);
    }

    /// Start loading the current source in the background
    pub fn load(&self) -> Pending<()> {
        let (completer, pending) = pending();
        self.load_with(move |result| completer.complete(result));
        pending
    }

    /// Like `load`, but invokes `on_done` from the loader thread
    pub fn load_with<F>(&self, on_done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let src = self.inner.state.lock().src.clone();
        let Some(src) = src else {
            on_done(Err(AudioError::LoadError(
                "Media element has no source".to_string(),
            )));
            return;
        };
        self.inner.state.lock().ready = ReadyState::Loading;

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let inner = self.inner.clone();
        let job = move || {
            inner.callbacks.dispatch_event(CallbackEvent::MediaLoadStart);
            let result = inner
                .fetcher
                .fetch(&src)
                .and_then(|bytes| decode_to_buffer(bytes, &src, inner.spec));

            if inner.generation.load(Ordering::SeqCst) != generation {
                log::debug!("Discarding stale load of {}", src);
                return Err(AudioError::Cancelled);
            }
            inner.finish_load(&src, result)
        };

        let builder = thread::Builder::new().name("looptrack-element-load".to_string());
        if !spawn_loader(builder, job, on_done) {
            self.inner.state.lock().ready = ReadyState::Failed;
        }
    }

    /// Start or resume playback. A finished element restarts from the top.
    pub fn play(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        let frames = match (&state.media, state.ready) {
            (Some(media), ReadyState::Ready) => media.frames(),
            _ => {
                return Err(AudioError::PlaybackError(
                    "Media element has no playable media".to_string(),
                ))
            }
        };
        if state.position >= frames {
            state.position = 0;
        }
        state.paused = false;
        Ok(())
    }

    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Playback position in seconds
    pub fn current_time(&self) -> f64 {
        self.inner.state.lock().position as f64 / self.inner.spec.sample_rate.max(1) as f64
    }

    /// Seek, clamped to the media length
    pub fn set_current_time(&self, seconds: f64) {
        let mut state = self.inner.state.lock();
        let frames = state.media.as_ref().map(|m| m.frames()).unwrap_or(0);
        let target = if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.inner.spec.sample_rate as f64) as usize
        } else {
            0
        };
        state.position = target.min(frames);
    }

    /// Media length in seconds, once ready
    pub fn duration(&self) -> Option<f64> {
        self.inner.state.lock().media.as_ref().map(|m| m.duration())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.state.lock().ready
    }

    pub(crate) fn capture(&self) -> Result<()> {
        if self.inner.captured.swap(true, Ordering::SeqCst) {
            return Err(AudioError::InvalidState(
                "Media element is already routed through a graph".to_string(),
            ));
        }
        Ok(())
    }

    /// Add the next block of the element's output into `out`
    pub(crate) fn render(&self, out: &mut [f32], channels: usize) {
        let mut state = self.inner.state.lock();
        if state.paused {
            return;
        }
        let Some(media) = state.media.clone() else {
            return;
        };
        let frames = media.frames();
        if frames == 0 {
            state.paused = true;
            return;
        }

        for frame in out.chunks_exact_mut(channels) {
            if state.position >= frames {
                if state.looping {
                    state.position = 0;
                } else {
                    state.paused = true;
                    break;
                }
            }
            media.read_frame(state.position, frame);
            state.position += 1;
        }
    }
}

/// Run `job` on a thread from `builder` and pass its result to `on_done`.
/// If the thread cannot start, `on_done` receives the spawn error instead
/// and this returns false.
fn spawn_loader<J, F>(builder: thread::Builder, job: J, on_done: F) -> bool
where
    J: FnOnce() -> Result<()> + Send + 'static,
    F: FnOnce(Result<()>) + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(on_done)));
    let worker_slot = slot.clone();
    let spawned = builder.spawn(move || {
        let outcome = job();
        let on_done = worker_slot.lock().take();
        if let Some(on_done) = on_done {
            on_done(outcome);
        }
    });

    match spawned {
        Ok(_) => true,
        Err(e) => {
            log::error!("Failed to spawn element loader: {}", e);
            let on_done = slot.lock().take();
            if let Some(on_done) = on_done {
                on_done(Err(AudioError::InitializationError(format!(
                    "loader thread: {}",
                    e
                ))));
            }
            false
        }
    }
}

impl ElementInner {
    fn finish_load(&self, src: &str, result: Result<AudioBuffer>) -> Result<()> {
        match result {
            Ok(media) => {
                let duration_secs = media.duration();
                {
                    let mut state = self.state.lock();
                    state.media = Some(media);
                    state.position = 0;
                    state.ready = ReadyState::Ready;
                }
                log::info!("Media element ready: {} ({:.2}s)", src, duration_secs);
                self.callbacks
                    .dispatch_event(CallbackEvent::MediaReady { duration_secs });
                Ok(())
            }
            Err(e) => {
                self.state.lock().ready = ReadyState::Failed;
                log::error!("Media element failed to load {}: {}", src, e);
                self.callbacks.dispatch_event(CallbackEvent::MediaError {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

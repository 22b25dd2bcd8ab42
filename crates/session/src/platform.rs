// Where contexts, elements and asset bytes come from

use looptrack_core::{EventObserver, Result};
use looptrack_graph::{AudioContext, AudioNode, AudioSpec, MediaElement};
use looptrack_renderer_cpal::CpalRenderer;
use looptrack_transport_http::Fetcher;
use parking_lot::Mutex;
use std::sync::Arc;

/// Host environment a session runs against
pub trait Platform: Send + Sync {
    /// Create a new, session-owned audio context
    fn create_context(&self) -> Result<AudioContext>;

    fn fetcher(&self) -> Arc<dyn Fetcher>;

    /// Provide an element that plays straight to the default output
    fn mount_element(&self) -> Result<MediaElement>;
}

/// Wrap `element` into `output` and route it to the destination
fn attach_to_output(output: &AudioContext, element: &MediaElement) -> Result<()> {
    let node = output.create_media_element_source(element)?;
    node.connect(&output.destination())?;
    Ok(())
}

/// Plays through the system's default output device (cpal)
pub struct DevicePlatform {
    spec: AudioSpec,
    fetcher: Arc<dyn Fetcher>,
    default_output: Mutex<Option<AudioContext>>,
}

impl DevicePlatform {
    pub fn new(spec: AudioSpec, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            spec,
            fetcher,
            default_output: Mutex::new(None),
        }
    }

    /// The shared context bare elements play through, opened on first use
    fn default_output(&self) -> Result<AudioContext> {
        let mut output = self.default_output.lock();
        if let Some(context) = output.as_ref() {
            return Ok(context.clone());
        }
        log::info!("Opening default output");
        let context = self.create_context()?;
        *output = Some(context.clone());
        Ok(context)
    }
}

impl Platform for DevicePlatform {
    fn create_context(&self) -> Result<AudioContext> {
        let renderer = CpalRenderer::new(self.spec)?;
        AudioContext::with_renderer(Box::new(renderer))
    }

    fn fetcher(&self) -> Arc<dyn Fetcher> {
        self.fetcher.clone()
    }

    fn mount_element(&self) -> Result<MediaElement> {
        let output = self.default_output()?;
        let element = MediaElement::new(self.fetcher.clone(), output.spec());
        attach_to_output(&output, &element)?;
        Ok(element)
    }
}

/// Contexts without a device. Audio only advances when `pump` is called.
pub struct OfflinePlatform {
    spec: AudioSpec,
    fetcher: Arc<dyn Fetcher>,
    /// Open contexts; closed ones are dropped on the next pump
    contexts: Mutex<Vec<AudioContext>>,
    contexts_created: Mutex<usize>,
    observers: Mutex<Vec<Arc<dyn EventObserver>>>,
    default_output: AudioContext,
    elements_mounted: Mutex<usize>,
}

impl OfflinePlatform {
    pub fn new(spec: AudioSpec, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            spec,
            fetcher,
            contexts: Mutex::new(Vec::new()),
            contexts_created: Mutex::new(0),
            observers: Mutex::new(Vec::new()),
            default_output: AudioContext::offline(spec),
            elements_mounted: Mutex::new(0),
        }
    }

    /// Attach `observer` to every context created from now on
    pub fn observe_contexts(&self, observer: Arc<dyn EventObserver>) {
        self.observers.lock().push(observer);
    }

    /// Number of contexts handed out by `create_context`
    pub fn contexts_created(&self) -> usize {
        *self.contexts_created.lock()
    }

    /// Number of created contexts that have not been closed
    pub fn live_contexts(&self) -> usize {
        self.open_contexts().len()
    }

    fn open_contexts(&self) -> Vec<AudioContext> {
        let mut contexts = self.contexts.lock();
        contexts.retain(|context| !context.is_closed());
        contexts.clone()
    }

    pub fn elements_mounted(&self) -> usize {
        *self.elements_mounted.lock()
    }

    pub fn default_output(&self) -> &AudioContext {
        &self.default_output
    }

    /// Render `frames` frames on every open context, discarding the output
    pub fn pump(&self, frames: usize) {
        let mut block = vec![0.0; frames * self.spec.channels.max(1) as usize];
        self.default_output.render(&mut block);
        for context in self.open_contexts() {
            context.render(&mut block);
        }
    }
}

impl Platform for OfflinePlatform {
    fn create_context(&self) -> Result<AudioContext> {
        let context = AudioContext::offline(self.spec);
        for observer in self.observers.lock().iter() {
            context.add_observer(observer.clone());
        }
        self.contexts.lock().push(context.clone());
        *self.contexts_created.lock() += 1;
        Ok(context)
    }

    fn fetcher(&self) -> Arc<dyn Fetcher> {
        self.fetcher.clone()
    }

    fn mount_element(&self) -> Result<MediaElement> {
        let element = MediaElement::new(self.fetcher.clone(), self.spec);
        attach_to_output(&self.default_output, &element)?;
        *self.elements_mounted.lock() += 1;
        Ok(element)
    }
}

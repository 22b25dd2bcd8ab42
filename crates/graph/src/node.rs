// Node handles. Each handle is a thin reference into its context's graph.

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::element::MediaElement;
use looptrack_core::{AudioError, Result};
use std::fmt;

/// Identifier of a node within its context; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a one-shot buffer source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created, not started yet
    Idle,
    Started,
    /// Stopped or ended; can never start again
    Stopped,
}

/// Common behaviour of every node handle
pub trait AudioNode {
    fn id(&self) -> NodeId;

    fn context(&self) -> &AudioContext;

    /// Route this node's output into `destination`. Returns `destination` so
    /// calls can be chained: `src.connect(&gain)?.connect(&ctx.destination())?`.
    fn connect<'a, N: AudioNode>(&self, destination: &'a N) -> Result<&'a N>
    where
        Self: Sized,
    {
        if !self.context().same_context(destination.context()) {
            return Err(AudioError::InvalidState(
                "Nodes belong to different contexts".to_string(),
            ));
        }
        self.context()
            .with_graph(|graph| graph.connect(self.id(), destination.id()))?;
        Ok(destination)
    }

    /// Drop every outgoing connection
    fn disconnect(&self) {
        self.context().with_graph(|graph| graph.disconnect(self.id()));
    }
}

/// The context's output sink
#[derive(Clone)]
pub struct DestinationNode {
    pub(crate) id: NodeId,
    pub(crate) context: AudioContext,
}

impl AudioNode for DestinationNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn context(&self) -> &AudioContext {
        &self.context
    }
}

/// Multiplies the sum of its inputs by a gain factor
#[derive(Clone)]
pub struct GainNode {
    pub(crate) id: NodeId,
    pub(crate) context: AudioContext,
}

impl GainNode {
    pub fn set_gain(&self, gain: f32) {
        let gain = if gain.is_finite() { gain } else { 0.0 };
        self.context.with_graph(|graph| graph.set_gain(self.id, gain));
    }

    pub fn gain(&self) -> f32 {
        self.context
            .with_graph(|graph| graph.gain(self.id))
            .unwrap_or(0.0)
    }
}

impl AudioNode for GainNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn context(&self) -> &AudioContext {
        &self.context
    }
}

/// Plays an `AudioBuffer` once. A stopped node can never be restarted;
/// create a new one per playback.
#[derive(Clone)]
pub struct BufferSourceNode {
    pub(crate) id: NodeId,
    pub(crate) context: AudioContext,
}

impl BufferSourceNode {
    fn configure(&self, f: impl FnOnce(&mut crate::graph::BufferSource)) -> Result<()> {
        self.context.with_graph(|graph| {
            let source = graph.buffer_source_mut(self.id).ok_or_else(|| {
                AudioError::InvalidState(format!("Source {} has been retired", self.id))
            })?;
            f(source);
            Ok(())
        })
    }

    pub fn set_buffer(&self, buffer: AudioBuffer) -> Result<()> {
        self.configure(|source| source.buffer = Some(buffer))
    }

    pub fn set_loop(&self, looping: bool) -> Result<()> {
        self.configure(|source| source.looping = looping)
    }

    /// Loop start in seconds
    pub fn set_loop_start(&self, seconds: f64) -> Result<()> {
        self.configure(|source| source.loop_start = seconds)
    }

    /// Loop end in seconds
    pub fn set_loop_end(&self, seconds: f64) -> Result<()> {
        self.configure(|source| source.loop_end = seconds)
    }

    pub fn is_looping(&self) -> bool {
        self.context
            .with_graph(|graph| graph.buffer_source(self.id).map(|s| s.looping))
            .unwrap_or(false)
    }

    /// Configured `(loop_start, loop_end)` in seconds, if still in the graph
    pub fn loop_bounds(&self) -> Option<(f64, f64)> {
        self.context.with_graph(|graph| {
            graph
                .buffer_source(self.id)
                .map(|s| (s.loop_start, s.loop_end))
        })
    }

    pub fn start(&self) -> Result<()> {
        self.context.with_graph(|graph| graph.start_source(self.id))?;
        self.context.flush_events();
        Ok(())
    }

    /// Stop playback. Stopping twice is a no-op; stopping a node that never
    /// started is an error.
    pub fn stop(&self) -> Result<()> {
        self.context.with_graph(|graph| graph.stop_source(self.id))?;
        self.context.flush_events();
        Ok(())
    }

    /// Remove a source that was never started from the graph
    pub fn discard(&self) -> Result<()> {
        self.context.with_graph(|graph| graph.discard_source(self.id))
    }

    pub fn state(&self) -> SourceState {
        self.context.with_graph(|graph| graph.source_state(self.id))
    }
}

impl AudioNode for BufferSourceNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn context(&self) -> &AudioContext {
        &self.context
    }
}

/// Routes a `MediaElement` into the graph. Transport stays on the element.
#[derive(Clone)]
pub struct MediaElementSourceNode {
    pub(crate) id: NodeId,
    pub(crate) context: AudioContext,
    pub(crate) element: MediaElement,
}

impl MediaElementSourceNode {
    pub fn media_element(&self) -> &MediaElement {
        &self.element
    }
}

impl AudioNode for MediaElementSourceNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn context(&self) -> &AudioContext {
        &self.context
    }
}

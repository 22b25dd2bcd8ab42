// Node storage, routing and block rendering for one context

use crate::buffer::AudioBuffer;
use crate::element::MediaElement;
use crate::node::{NodeId, SourceState};
use looptrack_core::{AudioError, CallbackEvent, Result};
use looptrack_renderer_api::AudioSpec;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

pub(crate) enum NodeKind {
    Destination,
    Gain { gain: f32 },
    BufferSource(BufferSource),
    ElementSource(MediaElement),
}

impl NodeKind {
    fn is_source(&self) -> bool {
        matches!(self, NodeKind::BufferSource(_) | NodeKind::ElementSource(_))
    }
}

pub(crate) struct NodeSlot {
    id: NodeId,
    kind: NodeKind,
}

/// One-shot buffer playback state
pub(crate) struct BufferSource {
    pub buffer: Option<AudioBuffer>,
    pub looping: bool,
    /// Seconds
    pub loop_start: f64,
    /// Seconds
    pub loop_end: f64,
    pub state: SourceState,
    cursor: usize,
}

impl BufferSource {
    fn new() -> Self {
        Self {
            buffer: None,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            state: SourceState::Idle,
            cursor: 0,
        }
    }

    /// Effective loop window in frames; falls back to the whole buffer when
    /// the configured bounds are unusable
    fn loop_frames(&self, buffer: &AudioBuffer) -> (usize, usize) {
        let frames = buffer.frames();
        let rate = buffer.sample_rate() as f64;
        if self.loop_start >= 0.0 && self.loop_end > 0.0 && self.loop_start < self.loop_end {
            let start = ((self.loop_start * rate).round() as usize).min(frames);
            let end = ((self.loop_end * rate).round() as usize).min(frames);
            if start < end {
                return (start, end);
            }
        }
        (0, frames)
    }

    /// Render one block; returns true when the source ran out this block
    fn render(&mut self, out: &mut [f32], channels: usize) -> bool {
        if self.state != SourceState::Started {
            return false;
        }
        let Some(buffer) = self.buffer.as_ref() else {
            return false;
        };

        let frames = buffer.frames();
        let (loop_start, loop_end) = self.loop_frames(buffer);

        for frame in out.chunks_exact_mut(channels) {
            if self.looping && frames > 0 {
                if self.cursor >= loop_end {
                    self.cursor = loop_start;
                }
            } else if self.cursor >= frames {
                self.state = SourceState::Stopped;
                return true;
            }
            buffer.read_frame(self.cursor, frame);
            self.cursor += 1;
        }
        false
    }
}

pub(crate) struct Graph {
    inner: StableGraph<NodeSlot, ()>,
    index_map: HashMap<NodeId, NodeIndex>,
    destination: NodeId,
    next_id: u64,
    topo_order: Option<Vec<NodeIndex>>,
    spec: AudioSpec,
    events: Vec<CallbackEvent>,
}

impl Graph {
    pub fn new(spec: AudioSpec) -> Self {
        let mut graph = Self {
            inner: StableGraph::new(),
            index_map: HashMap::new(),
            destination: NodeId(0),
            next_id: 0,
            topo_order: None,
            spec,
            events: Vec::new(),
        };
        graph.destination = graph.add_node(NodeKind::Destination);
        graph
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        let index = self.inner.add_node(NodeSlot { id, kind });
        self.index_map.insert(id, index);
        self.topo_order = None;
        id
    }

    pub fn add_buffer_source(&mut self) -> NodeId {
        self.add_node(NodeKind::BufferSource(BufferSource::new()))
    }

    fn remove_node(&mut self, id: NodeId) {
        if let Some(index) = self.index_map.remove(&id) {
            self.inner.remove_node(index);
            self.topo_order = None;
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        let index = *self.index_map.get(&id)?;
        self.inner.node_weight_mut(index)
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        let index = *self.index_map.get(&id)?;
        self.inner.node_weight(index)
    }

    pub fn buffer_source_mut(&mut self, id: NodeId) -> Option<&mut BufferSource> {
        match self.slot_mut(id).map(|slot| &mut slot.kind) {
            Some(NodeKind::BufferSource(source)) => Some(source),
            _ => None,
        }
    }

    pub fn buffer_source(&self, id: NodeId) -> Option<&BufferSource> {
        match self.slot(id).map(|slot| &slot.kind) {
            Some(NodeKind::BufferSource(source)) => Some(source),
            _ => None,
        }
    }

    pub fn set_gain(&mut self, id: NodeId, value: f32) {
        if let Some(NodeSlot {
            kind: NodeKind::Gain { gain },
            ..
        }) = self.slot_mut(id)
        {
            *gain = value;
        }
    }

    pub fn gain(&self, id: NodeId) -> Option<f32> {
        match self.slot(id).map(|slot| &slot.kind) {
            Some(NodeKind::Gain { gain }) => Some(*gain),
            _ => None,
        }
    }

    /// Start a one-shot source
    pub fn start_source(&mut self, id: NodeId) -> Result<()> {
        let source = self
            .buffer_source_mut(id)
            .ok_or_else(|| AudioError::InvalidState(format!("Source {} was already used", id)))?;
        if source.state != SourceState::Idle {
            return Err(AudioError::InvalidState(format!(
                "Source {} cannot be started twice",
                id
            )));
        }
        source.state = SourceState::Started;
        source.cursor = 0;
        self.events.push(CallbackEvent::NodeStarted { node_id: id.0 });
        Ok(())
    }

    /// Stop a started source and retire it from the graph
    pub fn stop_source(&mut self, id: NodeId) -> Result<()> {
        let Some(source) = self.buffer_source_mut(id) else {
            // Already retired
            return Ok(());
        };
        match source.state {
            SourceState::Idle => Err(AudioError::InvalidState(format!(
                "Source {} was never started",
                id
            ))),
            SourceState::Stopped => Ok(()),
            SourceState::Started => {
                source.state = SourceState::Stopped;
                self.events.push(CallbackEvent::NodeStopped { node_id: id.0 });
                self.remove_node(id);
                Ok(())
            }
        }
    }

    /// Drop a source that was never started. Started sources must go
    /// through `stop_source`.
    pub fn discard_source(&mut self, id: NodeId) -> Result<()> {
        match self.buffer_source(id).map(|source| source.state) {
            None | Some(SourceState::Stopped) => Ok(()),
            Some(SourceState::Idle) => {
                self.remove_node(id);
                Ok(())
            }
            Some(SourceState::Started) => Err(AudioError::InvalidState(format!(
                "Source {} is playing; stop it instead",
                id
            ))),
        }
    }

    pub fn source_state(&self, id: NodeId) -> SourceState {
        self.buffer_source(id)
            .map(|source| source.state)
            .unwrap_or(SourceState::Stopped)
    }

    pub fn active_source_count(&self) -> usize {
        self.inner
            .node_weights()
            .filter(|slot| {
                matches!(&slot.kind, NodeKind::BufferSource(source) if source.state == SourceState::Started)
            })
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Route `source` into `dest`
    pub fn connect(&mut self, source: NodeId, dest: NodeId) -> Result<()> {
        let source_idx = *self
            .index_map
            .get(&source)
            .ok_or_else(|| AudioError::InvalidState(format!("Node {} no longer exists", source)))?;
        let dest_idx = *self
            .index_map
            .get(&dest)
            .ok_or_else(|| AudioError::InvalidState(format!("Node {} no longer exists", dest)))?;

        if source == self.destination {
            return Err(AudioError::InvalidState(
                "The destination has no outputs".to_string(),
            ));
        }
        if self.inner[dest_idx].kind.is_source() {
            return Err(AudioError::InvalidState(format!(
                "Node {} is a source and takes no inputs",
                dest
            )));
        }
        if self.inner.find_edge(source_idx, dest_idx).is_some() {
            return Ok(());
        }

        let edge = self.inner.add_edge(source_idx, dest_idx, ());
        if is_cyclic_directed(&self.inner) {
            self.inner.remove_edge(edge);
            return Err(AudioError::InvalidState(format!(
                "Connecting {} to {} would create a cycle",
                source, dest
            )));
        }

        self.topo_order = None;
        Ok(())
    }

    /// Remove every outgoing connection of `source`
    pub fn disconnect(&mut self, source: NodeId) {
        let Some(&index) = self.index_map.get(&source) else {
            return;
        };
        let edges: Vec<_> = self
            .inner
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.inner.remove_edge(edge);
        }
        self.topo_order = None;
    }

    fn processing_order(&mut self) -> Vec<NodeIndex> {
        if self.topo_order.is_none() {
            // connect() rejects cycles, so toposort cannot fail here
            self.topo_order = toposort(&self.inner, None).ok();
        }
        self.topo_order.clone().unwrap_or_default()
    }

    /// Render one interleaved block into `out`.
    ///
    /// Every node renders exactly once per block, whether or not it reaches
    /// the destination, so unrouted sources still advance in time.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let channels = self.spec.channels.max(1) as usize;
        let len = out.len() - out.len() % channels;

        let mut outputs: HashMap<NodeIndex, Vec<f32>> = HashMap::new();
        let mut finished = Vec::new();

        for index in self.processing_order() {
            let inputs: Vec<NodeIndex> = self
                .inner
                .neighbors_directed(index, Direction::Incoming)
                .collect();
            let mut block = vec![0.0; len];

            let Some(slot) = self.inner.node_weight_mut(index) else {
                continue;
            };
            match &mut slot.kind {
                NodeKind::BufferSource(source) => {
                    if source.render(&mut block, channels) {
                        finished.push(slot.id);
                    }
                }
                NodeKind::ElementSource(element) => element.render(&mut block, channels),
                NodeKind::Gain { gain } => {
                    mix_inputs(&mut block, &inputs, &outputs, *gain);
                }
                NodeKind::Destination => {
                    mix_inputs(&mut block, &inputs, &outputs, 1.0);
                }
            }
            outputs.insert(index, block);
        }

        if let Some(mixed) = self
            .index_map
            .get(&self.destination)
            .and_then(|index| outputs.get(index))
        {
            out[..len].copy_from_slice(mixed);
        }

        for id in finished {
            self.events.push(CallbackEvent::NodeStopped { node_id: id.0 });
            self.remove_node(id);
        }
    }

    pub fn take_events(&mut self) -> Vec<CallbackEvent> {
        std::mem::take(&mut self.events)
    }
}

fn mix_inputs(
    block: &mut [f32],
    inputs: &[NodeIndex],
    outputs: &HashMap<NodeIndex, Vec<f32>>,
    gain: f32,
) {
    for input in inputs {
        if let Some(samples) = outputs.get(input) {
            for (out, sample) in block.iter_mut().zip(samples) {
                *out += sample * gain;
            }
        }
    }
}

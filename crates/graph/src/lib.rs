//! In-process audio graph: contexts, decoded buffers, media elements and
//! the nodes that route them through gain stages to an output.

pub mod buffer;
pub mod context;
pub mod element;
mod graph;
pub mod node;

pub use buffer::AudioBuffer;
pub use context::AudioContext;
pub use element::{MediaElement, ReadyState};
pub use node::{
    AudioNode, BufferSourceNode, DestinationNode, GainNode, MediaElementSourceNode, NodeId,
    SourceState,
};
pub use looptrack_renderer_api::AudioSpec;

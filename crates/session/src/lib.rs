//! Playback sessions: three ways to load and loop one background track,
//! all driven through the same load/play/stop lifecycle.

pub mod buffer;
pub mod element;
pub mod graph;
pub mod platform;
pub mod session;

pub use buffer::BufferSession;
pub use element::ElementSession;
pub use graph::GraphSession;
pub use platform::{DevicePlatform, OfflinePlatform, Platform};
pub use session::{Session, SessionKind};

// Core types shared by the looptrack audio crates

pub mod callback;
pub mod config;
pub mod error;
pub mod pending;
pub mod state;

// Re-export commonly used types
pub use callback::{CallbackEvent, CallbackManager, EventObserver, EventRecorder};
pub use config::{is_remote, DemoConfig};
pub use error::{AudioError, Result};
pub use pending::{pending, Completer, Pending};
pub use state::{SessionState, SessionStateContainer};

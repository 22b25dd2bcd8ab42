// Error handling shared by every looptrack crate

use thiserror::Error;

/// Audio error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// Failed to initialize a context or output device
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Failed to load the asset
    #[error("Load error: {0}")]
    LoadError(String),

    /// Playback error (e.g. play requested with no media ready)
    #[error("Playback error: {0}")]
    PlaybackError(String),

    /// Invalid state transition or misuse of a one-shot primitive
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Audio format not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Device error (hardware issues)
    #[error("Device error: {0}")]
    DeviceError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Decoding error
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Network error (asset fetch)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    ConfigError(String),

    /// A pending operation was dropped before it completed
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AudioError {
    fn from(err: serde_json::Error) -> Self {
        AudioError::ConfigError(err.to_string())
    }
}

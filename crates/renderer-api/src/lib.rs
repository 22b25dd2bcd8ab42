// Audio renderer abstraction layer

use looptrack_core::Result;

/// Type alias for audio callback
/// The callback fills an interleaved f32 slice and returns the number of
/// samples it wrote; the renderer zero-fills the rest.
pub type AudioCallback = Box<dyn FnMut(&mut [f32]) -> usize + Send + 'static>;

/// Audio renderer trait
/// Platform-specific output devices implement this trait
pub trait AudioRenderer: Send {
    /// Start the audio stream
    fn start(&mut self) -> Result<()>;

    /// Stop the audio stream
    fn stop(&mut self) -> Result<()>;

    /// Set the audio callback that provides PCM data
    fn set_audio_callback(&mut self, callback: AudioCallback) -> Result<()>;

    /// Format the device actually runs at
    fn spec(&self) -> AudioSpec;

    /// Check if the renderer is currently playing
    fn is_playing(&self) -> bool;

    /// Release all audio resources
    fn release(&mut self) -> Result<()>;
}

/// Audio format specification for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: usize,
}

impl AudioSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            ..Self::default()
        }
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_default_block_size() {
        let spec = AudioSpec::new(8000, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.buffer_size, 1024);
    }
}

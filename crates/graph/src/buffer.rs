// Decoded, immutable PCM shared between source nodes

use looptrack_core::Result;
use looptrack_decode::decode_all;
use looptrack_demux::Demuxer;
use looptrack_renderer_api::AudioSpec;
use looptrack_resampler::Resampler;
use std::sync::Arc;

/// Interleaved PCM in the layout of the context that decoded it.
/// Cloning is cheap; every clone shares the same samples.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Copy one frame into `out`, mapping channels onto the output layout
    pub(crate) fn read_frame(&self, frame: usize, out: &mut [f32]) {
        let channels = self.channels as usize;
        let start = frame * channels;
        if start + channels > self.samples.len() {
            return;
        }
        let source = &self.samples[start..start + channels];
        for (ch, sample) in out.iter_mut().enumerate() {
            *sample += source[ch.min(channels - 1)];
        }
    }
}

/// Demux, decode and convert an asset to `spec`
pub fn decode_to_buffer(bytes: Vec<u8>, name: &str, spec: AudioSpec) -> Result<AudioBuffer> {
    let decoded = decode_all(bytes, Demuxer::create_hint_from_path(name))?;
    let resampler = Resampler::new(
        decoded.sample_rate,
        spec.sample_rate,
        decoded.channels,
        spec.channels,
    );
    let samples = resampler.process(&decoded.samples);
    Ok(AudioBuffer::from_interleaved(samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use looptrack_decode::wav::{encode_pcm16, sine_tone};

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0; 16000], 8000, 2);
        assert_eq!(buffer.frames(), 8000);
        assert_eq!(buffer.duration(), 1.0);
    }

    #[test]
    fn test_decode_converts_to_context_format() {
        let bytes = encode_pcm16(&sine_tone(220.0, 0.5, 8000, 1), 8000, 1);
        let buffer = decode_to_buffer(bytes, "bgm.wav", AudioSpec::new(16000, 2)).unwrap();

        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 8000);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_read_frame_upmixes_mono() {
        let buffer = AudioBuffer::from_interleaved(vec![0.25, 0.75], 8000, 1);
        let mut frame = [0.0; 2];
        buffer.read_frame(1, &mut frame);
        assert_eq!(frame, [0.75, 0.75]);
    }
}

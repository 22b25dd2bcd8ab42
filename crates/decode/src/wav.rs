// Minimal 16-bit PCM WAV writer, used to produce test tones

use std::f32::consts::TAU;

/// Encode interleaved samples in [-1, 1] as a RIFF/WAVE 16-bit PCM file
pub fn encode_pcm16(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }

    out
}

/// Interleaved sine tone at half amplitude
pub fn sine_tone(frequency: f32, seconds: f32, sample_rate: u32, channels: u16) -> Vec<f32> {
    let frames = (seconds * sample_rate as f32).round() as usize;
    let mut out = Vec::with_capacity(frames * channels as usize);
    for frame in 0..frames {
        let value = 0.5 * (TAU * frequency * frame as f32 / sample_rate as f32).sin();
        for _ in 0..channels {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = encode_pcm16(&[0.0, 1.0, -1.0, 0.5], 22050, 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(i16::from_le_bytes([bytes[46], bytes[47]]), i16::MAX);
    }

    #[test]
    fn test_sine_tone_length() {
        assert_eq!(sine_tone(440.0, 0.5, 8000, 2).len(), 8000);
        assert_eq!(sine_tone(440.0, 0.0, 8000, 1).len(), 0);
    }
}

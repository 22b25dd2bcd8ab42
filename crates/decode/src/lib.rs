// Audio decoding using Symphonia

pub mod wav;

use looptrack_core::{AudioError, Result};
use looptrack_demux::Demuxer;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Audio decoder
pub struct AudioDecoder {
    decoder: Box<dyn Decoder>,
    sample_rate: u32,
    channels: u16,
}

impl AudioDecoder {
    /// Create decoder from demuxer
    pub fn from_demuxer(demuxer: &Demuxer) -> Result<Self> {
        let track_info = demuxer.get_track_info()?;
        let track = demuxer
            .format_reader()
            .tracks()
            .iter()
            .find(|t| t.id == demuxer.track_id())
            .ok_or_else(|| AudioError::LoadError("Track not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodingError(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            decoder,
            sample_rate: track_info.sample_rate,
            channels: track_info.channels,
        })
    }

    /// Decode a packet into interleaved PCM samples.
    ///
    /// A corrupt packet is skipped with `Ok(None)`; anything else is fatal.
    pub fn decode(&mut self, packet: &Packet) -> Result<Option<Vec<f32>>> {
        match self.decoder.decode(packet) {
            Ok(audio_buf) => {
                self.channels = audio_buf.spec().channels.count() as u16;
                Ok(Some(convert_audio_buffer_to_f32(audio_buf)))
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Decode error (skipping packet): {}", e);
                Ok(None)
            }
            Err(SymphoniaError::ResetRequired) => {
                self.decoder.reset();
                Ok(None)
            }
            Err(e) => Err(AudioError::DecodingError(format!("Decoding failed: {}", e))),
        }
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// A fully decoded track
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

const MAX_SAMPLES_PER_BYTE: usize = 8;

/// Demux and decode a whole asset into memory
pub fn decode_all(bytes: Vec<u8>, hint: Hint) -> Result<DecodedAudio> {
    let bytes_len = bytes.len();
    let mut demuxer = Demuxer::from_bytes(bytes, hint)?;
    let mut decoder = AudioDecoder::from_demuxer(&demuxer)?;

    let capacity = demuxer
        .get_track_info()?
        .n_frames
        .map(|n| (n as usize).saturating_mul(decoder.channels() as usize))
        .unwrap_or(0)
        // Headers can lie; no codec expands a byte into more than a few samples
        .min(bytes_len.saturating_mul(MAX_SAMPLES_PER_BYTE));
    let mut samples = Vec::with_capacity(capacity);

    while let Some(packet) = demuxer.next_packet()? {
        if let Some(pcm) = decoder.decode(&packet)? {
            samples.extend_from_slice(&pcm);
        }
    }

    if samples.is_empty() {
        return Err(AudioError::DecodingError("No audio decoded".to_string()));
    }

    log::debug!(
        "Decoded {} samples ({} Hz, {} ch)",
        samples.len(),
        decoder.sample_rate(),
        decoder.channels()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: decoder.sample_rate(),
        channels: decoder.channels(),
    })
}

/// Convert Symphonia AudioBufferRef to interleaved f32 samples
fn convert_audio_buffer_to_f32(buffer: AudioBufferRef) -> Vec<f32> {
    match buffer {
        AudioBufferRef::F32(buf) => interleave(&buf),
        AudioBufferRef::F64(buf) => interleave(&buf),
        AudioBufferRef::S8(buf) => interleave(&buf),
        AudioBufferRef::S16(buf) => interleave(&buf),
        AudioBufferRef::S24(buf) => interleave(&buf),
        AudioBufferRef::S32(buf) => interleave(&buf),
        AudioBufferRef::U8(buf) => interleave(&buf),
        AudioBufferRef::U16(buf) => interleave(&buf),
        AudioBufferRef::U24(buf) => interleave(&buf),
        AudioBufferRef::U32(buf) => interleave(&buf),
    }
}

fn interleave<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample + IntoSample<f32>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    let mut output = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            output.push(buf.chan(ch_idx)[frame_idx].into_sample());
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{encode_pcm16, sine_tone};

    #[test]
    fn test_decode_all_wav() {
        let tone = sine_tone(440.0, 0.25, 8000, 2);
        let bytes = encode_pcm16(&tone, 8000, 2);

        let decoded = decode_all(bytes, Demuxer::create_hint_from_path("tone.wav")).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), 2000);

        // 16-bit quantisation only
        for (a, b) in decoded.samples.iter().zip(tone.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_all_survives_oversized_frame_count() {
        let mut bytes = encode_pcm16(&[0.1; 64], 8000, 1);
        // Claim a data chunk of almost 4 GiB
        bytes[40..44].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());

        match decode_all(bytes, Hint::new()) {
            Ok(decoded) => assert!(decoded.frames() <= 64),
            Err(_) => {}
        }
    }

    #[test]
    fn test_decode_all_rejects_garbage() {
        assert!(decode_all(vec![7u8; 1024], Hint::new()).is_err());
    }
}

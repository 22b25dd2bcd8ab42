// Demuxing in-memory audio assets using Symphonia

use looptrack_core::{AudioError, Result};
use std::io::Cursor;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio demuxer wrapper
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    /// Create demuxer from fetched bytes
    pub fn from_bytes(bytes: Vec<u8>, hint: Hint) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AudioError::LoadError("Empty asset".to_string()));
        }
        Self::from_media_source(Box::new(Cursor::new(bytes)), hint)
    }

    /// Create demuxer from a media source
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::LoadError(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;

        // First track that actually carries a codec
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::LoadError("No audio track found".to_string()))?;

        let track_id = track.id;

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Create a hint from the extension of a path or URL
    pub fn create_hint_from_path(path: &str) -> Hint {
        let mut hint = Hint::new();
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if let Some(extension) = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
        {
            hint.with_extension(extension);
        }
        hint
    }

    /// Next packet of our track, `None` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(AudioError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )))
                }
            };

            // Only return packets for our track
            if packet.track_id() == self.track_id {
                return Ok(Some(packet));
            }
        }
    }

    /// Get track information
    pub fn get_track_info(&self) -> Result<TrackInfo> {
        let track = self
            .format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| AudioError::LoadError("Track not found".to_string()))?;

        let codec_params = &track.codec_params;
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("Sample rate not specified".to_string()))?;

        Ok(TrackInfo {
            sample_rate,
            channels: codec_params
                .channels
                .map(|c| c.count() as u16)
                .unwrap_or(2),
            n_frames: codec_params.n_frames,
        })
    }

    /// Get reference to format reader
    pub fn format_reader(&self) -> &dyn FormatReader {
        &*self.format_reader
    }

    /// Get track ID
    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

/// Track information
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame count, when the container declares one
    pub n_frames: Option<u64>,
}

impl TrackInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        self.n_frames
            .map(|frames| frames as f64 / self.sample_rate.max(1) as f64)
    }
}

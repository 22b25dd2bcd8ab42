// Audio resampling and channel conversion

/// Converts decoded PCM to the sample rate and layout of an audio context
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    input_channels: u16,
    output_channels: u16,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> Self {
        Self {
            input_rate: input_rate.max(1),
            output_rate: output_rate.max(1),
            input_channels: input_channels.max(1),
            output_channels: output_channels.max(1),
        }
    }

    /// Resample and convert channels if needed
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        if !needs_resampling(
            self.input_rate,
            self.output_rate,
            self.input_channels,
            self.output_channels,
        ) {
            return input.to_vec();
        }

        log::debug!(
            "Converting {} Hz/{} ch -> {} Hz/{} ch",
            self.input_rate,
            self.input_channels,
            self.output_rate,
            self.output_channels
        );

        // Channels first, so interpolation runs on the output layout
        let mut output = if self.input_channels != self.output_channels {
            self.convert_channels(input)
        } else {
            input.to_vec()
        };

        if self.input_rate != self.output_rate {
            output = self.resample(&output);
        }

        output
    }

    /// Convert between different channel configurations
    fn convert_channels(&self, input: &[f32]) -> Vec<f32> {
        let in_ch = self.input_channels as usize;
        let out_ch = self.output_channels as usize;
        let frames = input.len() / in_ch;
        let mut output = Vec::with_capacity(frames * out_ch);

        for frame in input.chunks_exact(in_ch) {
            match (in_ch, out_ch) {
                // Downmix to mono: average every channel
                (_, 1) => output.push(frame.iter().sum::<f32>() / in_ch as f32),
                // Upmix mono: duplicate
                (1, _) => output.extend(std::iter::repeat(frame[0]).take(out_ch)),
                // Otherwise keep the leading channels and pad with silence
                _ => {
                    for ch in 0..out_ch {
                        output.push(frame.get(ch).copied().unwrap_or(0.0));
                    }
                }
            }
        }

        output
    }

    /// Simple linear interpolation resampling
    fn resample(&self, input: &[f32]) -> Vec<f32> {
        let channels = self.output_channels as usize;
        let input_frames = input.len() / channels;
        if input_frames == 0 {
            return Vec::new();
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let output_frames = (input_frames as f64 * ratio).round() as usize;
        let mut output = Vec::with_capacity(output_frames * channels);

        for frame_idx in 0..output_frames {
            let src_frame = frame_idx as f64 / ratio;
            let src_frame_floor = (src_frame.floor() as usize).min(input_frames - 1);
            let src_frame_ceil = (src_frame_floor + 1).min(input_frames - 1);
            let frac = (src_frame - src_frame_floor as f64) as f32;

            for ch in 0..channels {
                let sample1 = input[src_frame_floor * channels + ch];
                let sample2 = input[src_frame_ceil * channels + ch];
                output.push(sample1 + (sample2 - sample1) * frac);
            }
        }

        output
    }
}

/// Check if resampling is needed
pub fn needs_resampling(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> bool {
    input_rate != output_rate || input_channels != output_channels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let resampler = Resampler::new(48000, 48000, 2, 2);
        assert_eq!(resampler.process(&[0.1, 0.2, 0.3, 0.4]), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_mono_to_stereo() {
        let resampler = Resampler::new(8000, 8000, 1, 2);
        assert_eq!(resampler.process(&[0.5, -0.5]), vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_stereo_to_mono() {
        let resampler = Resampler::new(8000, 8000, 2, 1);
        assert_eq!(resampler.process(&[1.0, 0.0, 0.5, 0.5]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_upsample_doubles_frames() {
        let resampler = Resampler::new(8000, 16000, 1, 1);
        let output = resampler.process(&[0.0, 1.0, 0.0, -1.0]);
        assert_eq!(output.len(), 8);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert_eq!(output[2], 1.0);
    }

    #[test]
    fn test_empty_input() {
        let resampler = Resampler::new(44100, 48000, 2, 2);
        assert!(resampler.process(&[]).is_empty());
    }
}

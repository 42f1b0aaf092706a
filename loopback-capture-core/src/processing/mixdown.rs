/// Pure-math channel folding, resampling and PCM conversion.
///
/// Converts whatever a capture source delivers (any rate, any channel count)
/// into the session's output format before it reaches the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Mixdown {
    pub target_sample_rate: f64,
    pub target_channels: u16,
    source_sample_rate: f64,
    /// Read position, in frames, relative to the carried frame.
    position: f64,
    /// Last input frame of the previous call.
    carry: Vec<f32>,
}

impl Mixdown {
    pub fn new(target_sample_rate: f64, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels: target_channels.max(1),
            source_sample_rate: 0.0,
            position: 0.0,
            carry: Vec::new(),
        }
    }

    /// Fold to the target channel count, then resample to the target rate.
    pub fn process(&mut self, samples: &[f32], source_sample_rate: f64, source_channels: u16) -> Vec<f32> {
        let folded = fold_channels(samples, source_channels.max(1), self.target_channels);
        self.resample_interleaved(&folded, source_sample_rate, self.target_channels)
    }

    /// Linear interpolation resampling for interleaved audio.
    ///
    /// The read position and the last input frame carry over between calls,
    /// so a stream fed in chunks yields the same frames as one fed whole.
    /// Input already at the target rate passes through unchanged.
    pub fn resample_interleaved(&mut self, samples: &[f32], source_sample_rate: f64, channels: u16) -> Vec<f32> {
        let channels = usize::from(channels.max(1));
        if (source_sample_rate - self.source_sample_rate).abs() >= 0.01
            || (!self.carry.is_empty() && self.carry.len() != channels)
        {
            self.reset(source_sample_rate);
        }
        if (source_sample_rate - self.target_sample_rate).abs() < 0.01 || source_sample_rate <= 0.0 {
            return samples.to_vec();
        }

        let mut input = Vec::with_capacity(self.carry.len() + samples.len());
        input.extend_from_slice(&self.carry);
        input.extend_from_slice(&samples[..samples.len() / channels * channels]);
        let frame_count = input.len() / channels;
        if frame_count == 0 {
            return Vec::new();
        }

        let step = source_sample_rate / self.target_sample_rate;
        let mut output = Vec::with_capacity((frame_count as f64 / step) as usize * channels + channels);
        while (self.position as usize) + 1 < frame_count {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            for ch in 0..channels {
                let a = input[index * channels + ch];
                let b = input[(index + 1) * channels + ch];
                output.push(a + (b - a) * fraction);
            }
            self.position += step;
        }

        self.position -= (frame_count - 1) as f64;
        self.carry = input[(frame_count - 1) * channels..].to_vec();
        output
    }

    fn reset(&mut self, source_sample_rate: f64) {
        self.source_sample_rate = source_sample_rate;
        self.position = 0.0;
        self.carry.clear();
    }
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Convert between channel layouts.
///
/// Mono is duplicated into every output channel; surround layouts keep their
/// front pair when folded to stereo.
pub fn fold_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = usize::from(from.max(1));
    let to = usize::from(to.max(1));
    if from == to {
        return samples.to_vec();
    }
    if to == 1 {
        return downmix_to_mono(samples, from);
    }
    if from == 1 {
        let mut out = Vec::with_capacity(samples.len() * to);
        for &s in samples {
            out.extend(std::iter::repeat(s).take(to));
        }
        return out;
    }
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            out.push(if ch < from { frame[ch] } else { 0.0 });
        }
    }
    out
}

/// Convert f32 samples `[-1.0, 1.0]` to little-endian integer PCM.
///
/// Supports 16, 24 and 32-bit output; clamps out-of-range values.
pub fn convert_to_pcm(samples: &[f32], bit_depth: u16) -> Vec<u8> {
    let bytes_per_sample = usize::from(bit_depth / 8);
    let mut data = Vec::with_capacity(samples.len() * bytes_per_sample);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        match bit_depth {
            24 => {
                let value = (f64::from(clamped) * 8_388_607.0) as i32;
                data.extend_from_slice(&value.to_le_bytes()[..3]);
            }
            32 => {
                let value = (f64::from(clamped) * f64::from(i32::MAX)) as i32;
                data.extend_from_slice(&value.to_le_bytes());
            }
            _ => {
                let value = (clamped * i16::MAX as f32) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    data
}

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn downmix_stereo_to_mono() {
        let mono = downmix_to_mono(&[0.2, 0.8, 0.4, 0.6], 2);
        assert_eq!(mono.len(), 2);
        assert_relative_eq!(mono[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(mono[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn mono_duplicated_to_stereo() {
        assert_eq!(fold_channels(&[1.0, 2.0], 1, 2), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn surround_keeps_front_pair() {
        let six = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(fold_channels(&six, 6, 2), vec![1.0, 2.0]);
    }

    #[test]
    fn same_layout_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(fold_channels(&samples, 2, 2), samples);
    }

    #[test]
    fn resample_same_rate_is_passthrough() {
        let mut mixdown = Mixdown::new(48000.0, 1);
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(mixdown.resample_interleaved(&samples, 48000.0, 1), samples);
    }

    #[test]
    fn upsample_interpolates_across_chunks() {
        let mut mixdown = Mixdown::new(48000.0, 1);
        let mut out = mixdown.resample_interleaved(&[0.0, 1.0], 24000.0, 1);
        out.extend(mixdown.resample_interleaved(&[2.0, 3.0], 24000.0, 1));

        let expected = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        assert_eq!(out.len(), expected.len());
        for (got, want) in out.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn resample_downsample_stereo() {
        let mut mixdown = Mixdown::new(24000.0, 2);
        let samples: Vec<f32> = (0..200).map(|i| i as f32 / 200.0).collect();
        // 100 stereo frames at 48kHz → 50 frames at 24kHz
        assert_eq!(mixdown.resample_interleaved(&samples, 48000.0, 2).len(), 100);
    }

    #[test]
    fn chunked_stream_does_not_drift() {
        let source: Vec<f32> = (0..10_000).map(|i| (i as f32 * 0.01).sin()).collect();

        let mut whole = Mixdown::new(48000.0, 1);
        let expected = whole.resample_interleaved(&source, 44100.0, 1);

        let mut chunked = Mixdown::new(48000.0, 1);
        let mut out = Vec::new();
        for chunk in source.chunks(100) {
            out.extend(chunked.resample_interleaved(chunk, 44100.0, 1));
        }

        // 10_000 frames at 44.1 kHz is about 10_884 frames at 48 kHz
        assert!(expected.len() >= 10_880, "{}", expected.len());
        assert_eq!(out.len(), expected.len());
        for (got, want) in out.iter().zip(&expected) {
            assert_relative_eq!(*got, *want, epsilon = 1e-4);
        }
    }

    #[test]
    fn rate_change_restarts_interpolation() {
        let mut mixdown = Mixdown::new(48000.0, 1);
        mixdown.resample_interleaved(&[0.5; 10], 24000.0, 1);
        let out = mixdown.resample_interleaved(&[1.0; 4], 16000.0, 1);
        assert_eq!(out.len(), 9);
        assert!(out.iter().all(|s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn process_folds_then_resamples() {
        let mut mixdown = Mixdown::new(16000.0, 1);
        let stereo_48k = vec![0.5f32; 480 * 2];
        let out = mixdown.process(&stereo_48k, 48000.0, 2);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn pcm16_conversion_clamps() {
        let pcm = convert_to_pcm(&[0.0, 1.0, -1.0, 2.0], 16);
        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), i16::MAX);
    }

    #[test]
    fn pcm24_and_32_widths() {
        assert_eq!(convert_to_pcm(&[0.5, -0.5], 24).len(), 6);
        let pcm32 = convert_to_pcm(&[1.0], 32);
        assert_eq!(i32::from_le_bytes([pcm32[0], pcm32[1], pcm32[2], pcm32[3]]), i32::MAX);
    }

    #[test]
    fn levels() {
        assert_eq!(rms_level(&[0.0, 0.0, 0.0]), 0.0);
        assert_relative_eq!(rms_level(&[1.0, 1.0, 1.0]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5, epsilon = 1e-6);
    }
}

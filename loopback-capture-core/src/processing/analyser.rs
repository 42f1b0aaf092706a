use std::f32::consts::PI;
use std::sync::Arc;

use parking_lot::Mutex;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::models::error::CaptureError;
use crate::processing::mixdown::downmix_to_mono;
use crate::processing::ring_buffer::RingBuffer;

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.3;
pub const DEFAULT_MIN_DB: f32 = -100.0;
pub const DEFAULT_MAX_DB: f32 = -30.0;

/// Analysis stage parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
        }
    }
}

impl AnalyserOptions {
    fn validate(&self) -> Result<(), CaptureError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "fft size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "smoothing must be in [0, 1], got {}",
                self.smoothing
            )));
        }
        if self.min_db >= self.max_db {
            return Err(CaptureError::ConfigurationFailed("min dB must be below max dB".into()));
        }
        Ok(())
    }
}

struct AnalyserState {
    time_domain: RingBuffer,
    smoothed: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

/// Windowed frequency-domain analysis of the most recent samples.
///
/// Passive: it observes the signal and never alters it. The capture thread
/// pushes samples; the level monitor reads byte-scaled magnitudes.
pub struct AnalyserNode {
    options: AnalyserOptions,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    state: Mutex<AnalyserState>,
}

impl AnalyserNode {
    pub fn new(options: AnalyserOptions) -> Result<Self, CaptureError> {
        options.validate()?;

        let n = options.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);

        // Blackman window
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        let state = AnalyserState {
            time_domain: RingBuffer::new(n),
            smoothed: vec![0.0; n / 2],
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
        };

        Ok(Self {
            options,
            fft,
            window,
            state: Mutex::new(state),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.options.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.options.fft_size / 2
    }

    /// Feed interleaved samples; multi-channel input is averaged to mono.
    pub fn push(&self, samples: &[f32], channels: u16) {
        let mono = downmix_to_mono(samples, usize::from(channels));
        self.state.lock().time_domain.write(&mono);
    }

    /// Smoothed magnitudes scaled into `0..=255` between the min and max dB bounds.
    pub fn byte_frequency_data(&self) -> Vec<u8> {
        let n = self.options.fft_size;
        let bins = n / 2;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let latest = state.time_domain.peek_latest(n);
        let pad = n - latest.len();
        for (i, slot) in state.input.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { latest[i - pad] };
            *slot = sample * self.window[i];
        }

        if let Err(e) = self.fft.process(&mut state.input, &mut state.spectrum) {
            log::error!("analyser fft failed: {}", e);
            return vec![0; bins];
        }

        let tau = self.options.smoothing;
        let range = self.options.max_db - self.options.min_db;
        let mut out = Vec::with_capacity(bins);
        for k in 0..bins {
            let magnitude = state.spectrum[k].norm() / n as f32;
            let smoothed = tau * state.smoothed[k] + (1.0 - tau) * magnitude;
            state.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let db = 20.0 * state.smoothed[k].max(f32::MIN_POSITIVE).log10();
            let scaled = (255.0 / range * (db - self.options.min_db)).floor();
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }
        out
    }
}

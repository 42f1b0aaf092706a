use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::config::{clamp_gain, GAIN_MAX_GENERIC};

/// Amplitude scaling stage.
///
/// The factor lives in an atomic so the audio thread can read it while the
/// caller adjusts it.
#[derive(Debug)]
pub struct GainNode {
    gain_bits: AtomicU32,
}

impl GainNode {
    /// `initial` must already be clamped by the caller.
    pub fn new(initial: f32) -> Self {
        Self {
            gain_bits: AtomicU32::new(initial.to_bits()),
        }
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    /// Runtime adjustment, held to the generic bound.
    pub fn set_gain(&self, gain: f32) -> f32 {
        let clamped = clamp_gain(gain, GAIN_MAX_GENERIC);
        self.gain_bits.store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }

    pub fn process(&self, samples: &mut [f32]) {
        let gain = self.gain();
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

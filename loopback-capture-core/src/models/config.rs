use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Upper gain bound for speech-oriented amplification of loopback sources.
pub const GAIN_MAX_SPEECH: f32 = 8.0;

/// Upper gain bound for generic, caller-adjusted gain.
pub const GAIN_MAX_GENERIC: f32 = 5.0;

/// Multiplier applied to the configured gain when the source is system audio.
pub const SYSTEM_AUDIO_GAIN_MULTIPLIER: f32 = 2.0;

/// Recording quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl Quality {
    /// Fixed `(sample_rate, bit_depth)` preset for this quality.
    pub fn preset(self) -> (u32, u16) {
        match self {
            Quality::Low => (16000, 16),
            Quality::Medium => (44100, 16),
            Quality::High => (48000, 16),
            Quality::Ultra => (96000, 16),
        }
    }
}

/// Caller-facing configuration for one capture session.
///
/// Every field is independently defaultable when deserialized from JSON. A
/// `quality` without an explicit `sampleRate` or `bitDepth` fills them from
/// its preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCaptureConfig", rename_all = "camelCase")]
pub struct CaptureConfig {
    pub quality: Quality,

    /// Output channel count. Valid values: 1, 2.
    pub channels: u16,

    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// PCM bit depth. Valid values: 16, 24, 32.
    pub bit_depth: u16,

    /// Requested gain. Clamped, never rejected.
    pub gain: f32,

    pub prefer_system_audio: bool,
    pub allow_microphone_fallback: bool,

    /// Permit non-interactive system audio methods (device loopback, native tool, host auto).
    pub auto_capture: bool,

    /// Skip interactive methods (manual source picking, display capture prompt).
    pub automatic_only: bool,

    /// Recording length in seconds. 0 records until stopped.
    #[serde(rename = "duration")]
    pub duration_secs: u32,

    /// Disable echo cancellation, noise suppression and auto gain on microphone capture.
    pub raw_microphone: bool,

    /// Preferred microphone device id, or `None` for the system default.
    pub microphone_device: Option<String>,

    /// Device name handed to the native capture tool, or `None` to pick a loopback hint.
    pub native_device: Option<String>,

    /// Target encoder bitrate for compressed formats.
    pub bits_per_second: u32,

    /// Level monitor tick interval.
    pub level_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let (sample_rate, bit_depth) = Quality::High.preset();
        Self {
            quality: Quality::High,
            channels: 2,
            sample_rate,
            bit_depth,
            gain: 2.0,
            prefer_system_audio: true,
            allow_microphone_fallback: true,
            auto_capture: true,
            automatic_only: false,
            duration_secs: 0,
            raw_microphone: false,
            microphone_device: None,
            native_device: None,
            bits_per_second: 256_000,
            level_interval_ms: 100,
        }
    }
}

/// Deserialized form of [`CaptureConfig`], before quality presets apply.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCaptureConfig {
    quality: Quality,
    channels: u16,
    sample_rate: Option<u32>,
    bit_depth: Option<u16>,
    gain: f32,
    prefer_system_audio: bool,
    allow_microphone_fallback: bool,
    auto_capture: bool,
    automatic_only: bool,
    #[serde(rename = "duration")]
    duration_secs: u32,
    raw_microphone: bool,
    microphone_device: Option<String>,
    native_device: Option<String>,
    bits_per_second: u32,
    level_interval_ms: u64,
}

impl Default for RawCaptureConfig {
    fn default() -> Self {
        let config = CaptureConfig::default();
        Self {
            quality: config.quality,
            channels: config.channels,
            sample_rate: None,
            bit_depth: None,
            gain: config.gain,
            prefer_system_audio: config.prefer_system_audio,
            allow_microphone_fallback: config.allow_microphone_fallback,
            auto_capture: config.auto_capture,
            automatic_only: config.automatic_only,
            duration_secs: config.duration_secs,
            raw_microphone: config.raw_microphone,
            microphone_device: config.microphone_device,
            native_device: config.native_device,
            bits_per_second: config.bits_per_second,
            level_interval_ms: config.level_interval_ms,
        }
    }
}

impl From<RawCaptureConfig> for CaptureConfig {
    fn from(raw: RawCaptureConfig) -> Self {
        let (preset_rate, preset_depth) = raw.quality.preset();
        Self {
            quality: raw.quality,
            channels: raw.channels,
            sample_rate: raw.sample_rate.unwrap_or(preset_rate),
            bit_depth: raw.bit_depth.unwrap_or(preset_depth),
            gain: raw.gain,
            prefer_system_audio: raw.prefer_system_audio,
            allow_microphone_fallback: raw.allow_microphone_fallback,
            auto_capture: raw.auto_capture,
            automatic_only: raw.automatic_only,
            duration_secs: raw.duration_secs,
            raw_microphone: raw.raw_microphone,
            microphone_device: raw.microphone_device,
            native_device: raw.native_device,
            bits_per_second: raw.bits_per_second,
            level_interval_ms: raw.level_interval_ms,
        }
    }
}

impl CaptureConfig {
    /// Apply a quality preset, overwriting sample rate and bit depth.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        let (sample_rate, bit_depth) = quality.preset();
        self.quality = quality;
        self.sample_rate = sample_rate;
        self.bit_depth = bit_depth;
        self
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed("sample rate must be positive".into()));
        }
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported bit depth: {}",
                self.bit_depth
            )));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        Ok(())
    }

    /// Gain actually applied by the signal graph.
    ///
    /// System audio gets the speech multiplier and the speech bound; anything
    /// else is held to the generic bound.
    pub fn effective_gain(&self, is_system_audio: bool) -> f32 {
        if is_system_audio {
            clamp_gain(self.gain * SYSTEM_AUDIO_GAIN_MULTIPLIER, GAIN_MAX_SPEECH)
        } else {
            clamp_gain(self.gain, GAIN_MAX_GENERIC)
        }
    }

    /// Fixed recording length, if any.
    pub fn duration(&self) -> Option<std::time::Duration> {
        (self.duration_secs > 0).then(|| std::time::Duration::from_secs(u64::from(self.duration_secs)))
    }

    pub fn level_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.level_interval_ms.max(1))
    }
}

/// Clamp a gain value into `[0, max]`. NaN maps to 0.
pub fn clamp_gain(gain: f32, max: f32) -> f32 {
    if gain.is_nan() {
        return 0.0;
    }
    gain.clamp(0.0, max)
}

use thiserror::Error;

use super::attempt::CaptureAttempt;

/// Errors that can occur while negotiating, recording or handing off audio.
///
/// Strategy failures are recorded in the attempt log; only `CaptureExhausted`,
/// `EmptyCapture`, `SilentCapture` and `Cancelled` normally reach the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no audio track: {0}")]
    NoAudioTrack(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("capture tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("capture subprocess failed: {message}")]
    CaptureSubprocessError { message: String, diagnostics: String },

    #[error("processing context unavailable: {0}")]
    ProcessingContextUnavailable(String),

    #[error("no supported encoding")]
    NoSupportedEncoding,

    #[error("nothing was recorded ({bytes} bytes)")]
    EmptyCapture { bytes: usize },

    #[error("audio was too quiet (average volume {average_volume:.4})")]
    SilentCapture { average_volume: f32 },

    #[error("cancelled")]
    Cancelled,

    #[error("{message}")]
    CaptureExhausted {
        message: String,
        attempts: Vec<CaptureAttempt>,
    },

    #[error("device enumeration failed: {0}")]
    EnumerationError(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("timeout")]
    Timeout,

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

impl CaptureError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Post-capture validation failures, reported distinctly from negotiation failures.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::EmptyCapture { .. } | Self::SilentCapture { .. })
    }
}

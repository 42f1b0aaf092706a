//! # loopback-capture-core
//!
//! Platform-agnostic system audio capture engine.
//!
//! Negotiates a usable audio stream through an ordered fallback cascade
//! (loopback devices, host-shell desktop capture, display capture, then the
//! microphone), wires it through a gain/analysis graph, monitors levels and
//! records a validated payload for transcription. Platform backends implement
//! the traits in [`traits`] and plug into [`CaptureEngine`].
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── traits/       ← CaptureProvider, MediaDevices, HostShell, CaptureStrategy, ProcessHandle, ...
//! ├── models/       ← CaptureError, CaptureConfig, CapabilityRecord, DeviceDescriptor, SessionState, ...
//! ├── media/        ← MediaStream/MediaTrack, constraints, replayed clips
//! ├── capture/      ← strategy adapters, plan, cascade runner, exhaustion remediation
//! ├── processing/   ← SignalGraph (gain, analyser, destination), mixdown, RingBuffer
//! ├── monitor/      ← LevelMonitor
//! ├── recorder/     ← Recorder + payload validation
//! ├── encoding/     ← EncoderRegistry, WAV
//! ├── process.rs    ← TerminationPolicy, SubprocessSlot
//! ├── session/      ← CaptureSession, CaptureEngine, setup probe
//! └── transcription.rs
//! ```

pub mod capture;
pub mod encoding;
pub mod media;
pub mod models;
pub mod monitor;
pub mod process;
pub mod processing;
pub mod recorder;
pub mod session;
pub mod traits;
pub mod transcription;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use capture::{plan_strategies, run_cascade, CaptureResult, Collaborators};
pub use encoding::EncoderRegistry;
pub use media::clip::ClipProvider;
pub use media::constraints::{AudioConstraints, MediaConstraints, VideoConstraints};
pub use media::stream::{MediaStream, MediaTrack, TrackKind, TrackState};
pub use models::attempt::{AttemptLog, CaptureAttempt};
pub use models::capability::{CapabilityRecord, PlatformFamily};
pub use models::config::{CaptureConfig, Quality};
pub use models::device::{DeviceDescriptor, DeviceKind};
pub use models::error::CaptureError;
pub use models::levels::{AudioLevels, LevelStatistics};
pub use models::payload::{CapturePayload, PayloadMetadata};
pub use models::state::{Outcome, SessionState};
pub use monitor::level_monitor::{LevelCallback, LevelMonitor};
pub use process::{SubprocessSlot, TerminationOutcome, TerminationPolicy};
pub use processing::graph::{ProcessingContext, RecordableStream, SignalGraph};
pub use processing::ring_buffer::RingBuffer;
pub use recorder::Recorder;
pub use session::{CaptureEngine, CaptureSession, SessionControl, SetupMethod, SetupReport, TeardownStep};
pub use traits::capture_provider::{AudioBufferCallback, CaptureProvider};
pub use traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
pub use traits::environment::EnvironmentProbe;
pub use traits::host_shell::{CapturableSource, HostShell, PermissionState, PermissionStatus, SourceKind};
pub use traits::media_devices::MediaDevices;
pub use traits::process_handle::ProcessHandle;
pub use traits::session_delegate::SessionDelegate;
pub use traits::transcriber::Transcriber;
pub use transcription::{submit_for_transcription, TranscriptionRequest, TranscriptionResponse};

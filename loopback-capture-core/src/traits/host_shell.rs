use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::media::constraints::MediaConstraints;
use crate::media::stream::MediaStream;
use crate::models::device::DeviceDescriptor;
use crate::models::error::CaptureError;

/// Kind of desktop source offered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Screen => "screen",
            SourceKind::Window => "window",
        }
    }
}

/// A screen or window the host can capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturableSource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionState {
    Granted,
    Denied,
    NotDetermined,
}

/// Host-reported permission snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub microphone: PermissionState,
    pub system_audio: PermissionState,
    pub screen_capture: PermissionState,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            microphone: PermissionState::Granted,
            system_audio: PermissionState::Granted,
            screen_capture: PermissionState::Granted,
        }
    }

    /// Whether the host has definitively refused desktop audio capture.
    pub fn denies_system_capture(&self) -> bool {
        self.screen_capture == PermissionState::Denied || self.system_audio == PermissionState::Denied
    }
}

/// A privileged desktop host able to enumerate and open desktop sources.
///
/// Calls may be slow, user-visible and fallible.
#[async_trait]
pub trait HostShell: Send + Sync {
    async fn list_capturable_sources(&self) -> Result<Vec<CapturableSource>, CaptureError>;

    async fn check_audio_permission(&self) -> Result<PermissionStatus, CaptureError>;

    async fn request_audio_permission(&self) -> Result<PermissionStatus, CaptureError>;

    /// Open a desktop stream bound to `source`.
    async fn open_source_stream(
        &self,
        source: &CapturableSource,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// Native audio endpoints the host can see without prompting.
    async fn list_native_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(Vec::new())
    }

    /// Present the host's source picker. `None` when the host has no picker.
    async fn select_source(&self, _sources: &[CapturableSource]) -> Result<Option<CapturableSource>, CaptureError> {
        Ok(None)
    }
}

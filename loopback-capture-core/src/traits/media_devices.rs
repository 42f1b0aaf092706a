use async_trait::async_trait;

use crate::media::constraints::MediaConstraints;
use crate::media::stream::MediaStream;
use crate::models::device::DeviceDescriptor;
use crate::models::error::CaptureError;

/// In-process media facility: endpoint enumeration, input capture and
/// user-mediated display capture.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// List audio endpoints. Fails with `EnumerationError` if the platform refuses.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError>;

    /// Open an input capture matching `constraints`.
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError>;

    /// Prompt the user to share a screen or window, optionally with audio.
    async fn get_display_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError>;

    fn supports_user_media(&self) -> bool {
        true
    }

    fn supports_display_capture(&self) -> bool {
        false
    }
}

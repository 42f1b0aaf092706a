use crate::models::error::CaptureError;
use crate::models::levels::AudioLevels;
use crate::models::payload::CapturePayload;
use crate::models::state::SessionState;

/// Event delegate for capture session notifications.
///
/// Level updates arrive from the monitor task, everything else from the
/// task driving the session.
pub trait SessionDelegate: Send + Sync {
    fn on_state_changed(&self, state: &SessionState);

    fn on_levels_updated(&self, levels: &AudioLevels);

    fn on_error(&self, error: &CaptureError);

    /// Called once per accepted session with the validated payload.
    fn on_payload_ready(&self, payload: &CapturePayload);
}

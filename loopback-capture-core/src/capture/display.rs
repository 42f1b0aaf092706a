use std::sync::Arc;

use async_trait::async_trait;

use crate::media::constraints::{AudioConstraints, MediaConstraints};
use crate::models::attempt::AttemptLog;
use crate::models::error::CaptureError;
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
use crate::traits::media_devices::MediaDevices;

pub const DISPLAY_CAPTURE: &str = "display-capture";

/// Shown when the user shared a screen but not its audio.
pub const SHARE_AUDIO_GUIDANCE: &str = "No audio was shared. When choosing what to share, tick the \
     \"Share system audio\" checkbox (or \"Share tab audio\" for a browser tab).";

/// User-mediated screen/audio sharing with the video discarded.
pub struct DisplayCaptureStrategy {
    media: Arc<dyn MediaDevices>,
}

impl DisplayCaptureStrategy {
    pub fn new(media: Arc<dyn MediaDevices>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl CaptureStrategy for DisplayCaptureStrategy {
    fn name(&self) -> &str {
        DISPLAY_CAPTURE
    }

    fn automatic(&self) -> bool {
        false
    }

    fn is_system_audio(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        _log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        if !self.media.supports_display_capture() {
            return Err(CaptureError::SourceUnavailable("display capture is not supported".into()));
        }

        let audio = AudioConstraints::raw().with_format(context.config.sample_rate, context.config.channels);
        let mut stream = match self.media.get_display_media(&MediaConstraints::audio_only(audio.clone())).await {
            Ok(stream) => stream,
            Err(e @ (CaptureError::PermissionDenied(_) | CaptureError::Cancelled)) => return Err(e),
            Err(e) => {
                log::debug!("audio-only display capture refused ({}), retrying with minimal video", e);
                self.media
                    .get_display_media(&MediaConstraints::with_minimal_video(audio))
                    .await?
            }
        };

        let dropped = stream.drop_video_tracks();
        if dropped > 0 {
            log::debug!("discarded {} display video tracks", dropped);
        }
        if !stream.has_usable_audio() {
            stream.stop();
            return Err(CaptureError::NoAudioTrack(SHARE_AUDIO_GUIDANCE.into()));
        }
        Ok(StrategyOutcome::new(stream, DISPLAY_CAPTURE))
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::media::constraints::{AudioConstraints, MediaConstraints};
use crate::models::attempt::AttemptLog;
use crate::models::error::CaptureError;
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
use crate::traits::media_devices::MediaDevices;

pub const MICROPHONE: &str = "microphone";

/// Plain input capture; the method of last resort.
pub struct MicrophoneStrategy {
    media: Arc<dyn MediaDevices>,
}

impl MicrophoneStrategy {
    pub fn new(media: Arc<dyn MediaDevices>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl CaptureStrategy for MicrophoneStrategy {
    fn name(&self) -> &str {
        MICROPHONE
    }

    fn automatic(&self) -> bool {
        true
    }

    fn is_system_audio(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        _log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        let config = context.config;
        let mut audio = if config.raw_microphone {
            AudioConstraints::raw()
        } else {
            AudioConstraints::processed()
        }
        .with_format(config.sample_rate, config.channels);
        if let Some(device) = &config.microphone_device {
            audio = audio.with_device(device.clone());
        }

        let stream = self.media.get_user_media(&MediaConstraints::audio_only(audio)).await?;
        Ok(StrategyOutcome::new(stream, MICROPHONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capability::{CapabilityRecord, PlatformFamily};
    use crate::models::config::CaptureConfig;
    use crate::process::SubprocessSlot;
    use crate::test_support::FakeMediaDevices;
    use tokio_util::sync::CancellationToken;

    async fn requested_audio(config: CaptureConfig) -> AudioConstraints {
        let media = Arc::new(FakeMediaDevices::new());
        let caps = CapabilityRecord::none(PlatformFamily::Linux);
        let cancel = CancellationToken::new();
        let slot = SubprocessSlot::new();
        let context = StrategyContext {
            config: &config,
            capabilities: &caps,
            cancel: &cancel,
            subprocess: &slot,
        };
        MicrophoneStrategy::new(media.clone())
            .attempt(&context, &mut AttemptLog::new())
            .await
            .unwrap();
        media.user_media_requests()[0].audio.clone().unwrap()
    }

    #[tokio::test]
    async fn processing_enabled_by_default() {
        let audio = requested_audio(CaptureConfig::default()).await;
        assert!(audio.echo_cancellation && audio.noise_suppression && audio.auto_gain_control);
        assert_eq!(audio.device_id, None);
    }

    #[tokio::test]
    async fn raw_fidelity_on_request() {
        let audio = requested_audio(CaptureConfig {
            raw_microphone: true,
            microphone_device: Some("usb-1".into()),
            ..CaptureConfig::default()
        })
        .await;
        assert!(audio.is_raw());
        assert_eq!(audio.device_id.as_deref(), Some("usb-1"));
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::media::constraints::{AudioConstraints, MediaConstraints};
use crate::models::attempt::AttemptLog;
use crate::models::device::{classify_devices, select_loopback_device};
use crate::models::error::CaptureError;
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
use crate::traits::media_devices::MediaDevices;

pub const DEVICE_LOOPBACK: &str = "device-loopback";

/// Opens a loopback-capable mixer input (Stereo Mix, virtual cables) found by
/// name among the enumerated endpoints.
pub struct DeviceLoopbackStrategy {
    media: Arc<dyn MediaDevices>,
}

impl DeviceLoopbackStrategy {
    pub fn new(media: Arc<dyn MediaDevices>) -> Self {
        Self { media }
    }
}

#[async_trait]
impl CaptureStrategy for DeviceLoopbackStrategy {
    fn name(&self) -> &str {
        DEVICE_LOOPBACK
    }

    fn automatic(&self) -> bool {
        true
    }

    fn is_system_audio(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        _log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        let devices = classify_devices(self.media.enumerate_devices().await?);
        log::debug!("enumerated {} audio endpoints", devices.len());

        let device = select_loopback_device(&devices).ok_or_else(|| {
            CaptureError::DeviceNotFound("no loopback-capable input device (e.g. Stereo Mix) found".into())
        })?;
        log::info!("using loopback device {} ({})", device.display_name, device.id);

        let constraints = MediaConstraints::audio_only(
            AudioConstraints::raw()
                .with_device(device.id.clone())
                .with_format(context.config.sample_rate, context.config.channels),
        );
        let stream = self.media.get_user_media(&constraints).await?;
        Ok(StrategyOutcome::new(stream, DEVICE_LOOPBACK))
    }
}

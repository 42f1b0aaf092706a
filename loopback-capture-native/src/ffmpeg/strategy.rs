use async_trait::async_trait;

use loopback_capture_core::encoding::wav::decode_wav;
use loopback_capture_core::models::device::select_loopback_device;
use loopback_capture_core::{
    AttemptLog, CaptureError, CaptureStrategy, ClipProvider, MediaStream, StrategyContext, StrategyOutcome,
};

use super::driver::NativeLoopbackDriver;
use crate::error::DriverError;

pub const NATIVE_LOOPBACK: &str = "native-loopback";

/// Cascade entry that records through the external capture tool.
///
/// Only fixed-duration captures qualify: the tool records the whole clip
/// up front, which is then replayed through the signal graph as a finite stream.
pub struct NativeLoopbackStrategy {
    driver: NativeLoopbackDriver,
}

impl NativeLoopbackStrategy {
    pub fn new(driver: NativeLoopbackDriver) -> Self {
        Self { driver }
    }

    async fn pick_device(&self, requested: Option<&str>) -> Result<String, CaptureError> {
        if let Some(device) = requested {
            return Ok(device.to_string());
        }
        let devices = self.driver.list_devices().await?;
        if let Some(device) = select_loopback_device(&devices) {
            return Ok(device.id.clone());
        }
        let first = devices.first().ok_or(DriverError::NoDevice {
            format: self.driver.options().format.as_str(),
        })?;
        log::warn!(
            "no loopback-capable device listed, falling back to {:?}",
            first.display_name
        );
        Ok(first.id.clone())
    }
}

#[async_trait]
impl CaptureStrategy for NativeLoopbackStrategy {
    fn name(&self) -> &str {
        NATIVE_LOOPBACK
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
        let config = context.config;
        let duration = config.duration().ok_or_else(|| {
            CaptureError::SourceUnavailable("native loopback capture needs a fixed duration".into())
        })?;

        self.driver.check_available().await?;
        let device = self.pick_device(config.native_device.as_deref()).await?;

        let bytes = self
            .driver
            .capture(
                &device,
                duration,
                config.sample_rate,
                config.channels,
                context.subprocess,
                context.cancel,
            )
            .await?;

        let clip = decode_wav(&bytes)?;
        log::info!(
            "native capture from {:?}: {:.2}s at {} Hz x{}",
            device,
            clip.duration_secs(),
            clip.sample_rate,
            clip.channels
        );
        let provider = ClipProvider::new(device, clip.samples, clip.sample_rate, clip.channels);
        Ok(StrategyOutcome::new(
            MediaStream::from_provider(Box::new(provider)),
            NATIVE_LOOPBACK,
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use loopback_capture_core::encoding::wav::generate_wav_header;
    use loopback_capture_core::models::capability::PlatformFamily;
    use loopback_capture_core::{CapabilityRecord, CaptureConfig, SubprocessSlot, TerminationPolicy};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use crate::ffmpeg::device_list::InputFormat;
    use crate::ffmpeg::driver::DriverOptions;

    struct Fixture {
        bin: TempDir,
        out: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                bin: TempDir::new().unwrap(),
                out: TempDir::new().unwrap(),
            }
        }

        /// A fake tool that lists one Stereo Mix device and "records" a 0.1 s WAV.
        fn tool(&self) -> String {
            let frames = 4800u32;
            let mut wav = generate_wav_header(48000, 16, 1, frames * 2).to_vec();
            for i in 0..frames {
                let v = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                wav.extend_from_slice(&v.to_le_bytes());
            }
            let clip = self.bin.path().join("clip.wav");
            std::fs::write(&clip, wav).unwrap();

            let path = self.bin.path().join("ffmpeg");
            let body = format!(
                r#"#!/bin/sh
case "$1" in
  -version) echo "ffmpeg version 6.1"; exit 0 ;;
esac
case "$*" in
  *list_devices*)
    echo '[dshow @ 01] DirectShow audio devices' >&2
    echo '[dshow @ 01]  "Stereo Mix (Realtek)"' >&2
    echo '[dshow @ 01] DirectShow video devices' >&2
    exit 1 ;;
esac
echo "$*" > "{args}"
for last; do :; done
cp "{clip}" "$last"
"#,
                args = self.bin.path().join("args.txt").display(),
                clip = clip.display()
            );
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn strategy(&self, program: String) -> NativeLoopbackStrategy {
            NativeLoopbackStrategy::new(NativeLoopbackDriver::new(DriverOptions {
                program,
                format: InputFormat::DirectShow,
                timeout_slack: Duration::from_secs(5),
                termination: TerminationPolicy::with_grace_period(Duration::from_millis(200)),
                temp_dir: self.out.path().to_path_buf(),
            }))
        }

        fn recorded_args(&self) -> String {
            std::fs::read_to_string(self.bin.path().join("args.txt")).unwrap_or_default()
        }
    }

    async fn attempt(strategy: &NativeLoopbackStrategy, config: &CaptureConfig) -> Result<StrategyOutcome, CaptureError> {
        let caps = CapabilityRecord::none(PlatformFamily::Windows);
        let cancel = CancellationToken::new();
        let slot = SubprocessSlot::new();
        let context = StrategyContext {
            config,
            capabilities: &caps,
            cancel: &cancel,
            subprocess: &slot,
        };
        let mut log = AttemptLog::new();
        let result = strategy.attempt(&context, &mut log).await;
        assert!(log.is_empty());
        assert!(!slot.is_occupied());
        result
    }

    fn timed_config() -> CaptureConfig {
        CaptureConfig {
            duration_secs: 1,
            ..CaptureConfig::default()
        }
    }

    #[tokio::test]
    async fn records_from_the_listed_loopback_device() {
        let fixture = Fixture::new();
        let strategy = fixture.strategy(fixture.tool());

        let outcome = attempt(&strategy, &timed_config()).await.unwrap();
        assert_eq!(outcome.method, NATIVE_LOOPBACK);
        assert!(outcome.stream.has_usable_audio());
        assert!(outcome.stream.has_provider());
        assert_eq!(outcome.stream.label(), Some("Stereo Mix (Realtek)"));
        assert!(fixture.recorded_args().contains("audio=Stereo Mix (Realtek)"));
    }

    #[tokio::test]
    async fn configured_device_skips_listing() {
        let fixture = Fixture::new();
        let strategy = fixture.strategy(fixture.tool());
        let config = CaptureConfig {
            native_device: Some("CABLE Output (VB-Audio)".into()),
            ..timed_config()
        };

        attempt(&strategy, &config).await.unwrap();
        assert!(fixture.recorded_args().contains("audio=CABLE Output (VB-Audio)"));
    }

    #[tokio::test]
    async fn open_ended_capture_is_not_eligible() {
        let fixture = Fixture::new();
        let strategy = fixture.strategy(fixture.tool());

        let err = attempt(&strategy, &CaptureConfig::default()).await.unwrap_err();
        assert!(matches!(err, CaptureError::SourceUnavailable(_)));
        assert!(fixture.recorded_args().is_empty());
    }

    #[tokio::test]
    async fn empty_listing_fails_with_device_not_found() {
        let fixture = Fixture::new();
        let path = fixture.bin.path().join("ffmpeg");
        std::fs::write(
            &path,
            "#!/bin/sh\ncase \"$1\" in\n  -version) echo 'ffmpeg version 6.1'; exit 0 ;;\nesac\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let strategy = fixture.strategy(path.to_string_lossy().into_owned());

        let err = attempt(&strategy, &timed_config()).await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceNotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn missing_tool_fails_the_attempt() {
        let fixture = Fixture::new();
        let strategy = fixture.strategy("/nonexistent/ffmpeg".into());

        let err = attempt(&strategy, &timed_config()).await.unwrap_err();
        assert!(matches!(err, CaptureError::ToolUnavailable(_)));
    }
}

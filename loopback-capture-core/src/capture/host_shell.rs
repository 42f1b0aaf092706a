use std::sync::Arc;

use async_trait::async_trait;

use crate::media::constraints::{AudioConstraints, MediaConstraints};
use crate::media::stream::MediaStream;
use crate::models::attempt::AttemptLog;
use crate::models::device::{classify_devices, select_loopback_device};
use crate::models::error::CaptureError;
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
use crate::traits::host_shell::{CapturableSource, HostShell, SourceKind};
use crate::traits::media_devices::MediaDevices;

pub const HOST_SHELL_AUTO: &str = "host-shell-auto";
pub const HOST_SHELL_MANUAL: &str = "host-shell-manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostShellMode {
    /// Use what the host exposes without showing a picker.
    Automatic,
    /// Let the user pick a source through the host.
    Manual,
}

/// Desktop capture through a privileged host shell.
pub struct HostShellStrategy {
    host: Arc<dyn HostShell>,
    media: Option<Arc<dyn MediaDevices>>,
    mode: HostShellMode,
}

impl HostShellStrategy {
    pub fn automatic(host: Arc<dyn HostShell>, media: Option<Arc<dyn MediaDevices>>) -> Self {
        Self {
            host,
            media,
            mode: HostShellMode::Automatic,
        }
    }

    pub fn manual(host: Arc<dyn HostShell>) -> Self {
        Self {
            host,
            media: None,
            mode: HostShellMode::Manual,
        }
    }

    pub fn mode(&self) -> HostShellMode {
        self.mode
    }

    /// Open a loopback-hint device from the host's native list, if any.
    async fn try_native_device(
        &self,
        context: &StrategyContext<'_>,
        log: &mut AttemptLog,
    ) -> Option<StrategyOutcome> {
        let media = self.media.as_ref()?;
        let devices = match self.host.list_native_devices().await {
            Ok(devices) => classify_devices(devices),
            Err(e) => {
                log::debug!("host native device listing failed: {}", e);
                return None;
            }
        };
        let device = select_loopback_device(&devices)?;

        let entry = format!("{}[device:{}]", self.name(), device.display_name);
        let constraints = MediaConstraints::audio_only(
            AudioConstraints::raw()
                .with_device(device.id.clone())
                .with_format(context.config.sample_rate, context.config.channels),
        );
        match media.get_user_media(&constraints).await {
            Ok(stream) if stream.has_usable_audio() => {
                log::info!("host native loopback device {} opened", device.display_name);
                Some(StrategyOutcome::new(stream, format!("{}:device", self.name())))
            }
            Ok(mut stream) => {
                stream.stop();
                log.record_failure(entry, self.automatic(), CaptureError::NoAudioTrack(device.display_name.clone()));
                None
            }
            Err(e) => {
                log.record_failure(entry, self.automatic(), e);
                None
            }
        }
    }

    /// Try each source in turn; the first one carrying usable audio wins.
    async fn iterate_sources(
        &self,
        sources: Vec<CapturableSource>,
        context: &StrategyContext<'_>,
        log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        let total = sources.len();
        for source in sources {
            if context.cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            let entry = format!("{}[{}:{}]", self.name(), source.kind.as_str(), source.name);
            match self.open_source(&source, context).await {
                Ok(stream) => {
                    log::info!("host source {} ({}) carries audio", source.name, source.kind.as_str());
                    return Ok(StrategyOutcome::new(
                        stream,
                        format!("{}:{}", self.name(), source.kind.as_str()),
                    ));
                }
                Err(CaptureError::Cancelled) => return Err(CaptureError::Cancelled),
                Err(e) => log.record_failure(entry, self.automatic(), e),
            }
        }
        Err(CaptureError::NoAudioTrack(format!(
            "none of the {} host sources provided system audio",
            total
        )))
    }

    async fn open_source(
        &self,
        source: &CapturableSource,
        context: &StrategyContext<'_>,
    ) -> Result<MediaStream, CaptureError> {
        let audio = AudioConstraints::raw().with_format(context.config.sample_rate, context.config.channels);
        let mut stream = self
            .host
            .open_source_stream(source, &MediaConstraints::with_minimal_video(audio))
            .await?;
        stream.drop_video_tracks();
        if !stream.has_usable_audio() {
            stream.stop();
            return Err(CaptureError::NoAudioTrack(format!(
                "{} \"{}\" has no audio track",
                source.kind.as_str(),
                source.name
            )));
        }
        Ok(stream)
    }
}

/// Screens first; they carry system audio more reliably than windows.
pub fn order_sources(mut sources: Vec<CapturableSource>) -> Vec<CapturableSource> {
    sources.sort_by_key(|s| match s.kind {
        SourceKind::Screen => 0,
        SourceKind::Window => 1,
    });
    sources
}

#[async_trait]
impl CaptureStrategy for HostShellStrategy {
    fn name(&self) -> &str {
        match self.mode {
            HostShellMode::Automatic => HOST_SHELL_AUTO,
            HostShellMode::Manual => HOST_SHELL_MANUAL,
        }
    }

    fn automatic(&self) -> bool {
        self.mode == HostShellMode::Automatic
    }

    fn is_system_audio(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        let permissions = match self.mode {
            HostShellMode::Automatic => self.host.check_audio_permission().await?,
            HostShellMode::Manual => self.host.request_audio_permission().await?,
        };
        if permissions.denies_system_capture() {
            return Err(CaptureError::PermissionDenied(
                "the host denied screen or system audio capture".into(),
            ));
        }

        if self.mode == HostShellMode::Automatic {
            if let Some(outcome) = self.try_native_device(context, log).await {
                return Ok(outcome);
            }
        }

        let mut sources = order_sources(self.host.list_capturable_sources().await?);
        if sources.is_empty() {
            return Err(CaptureError::SourceUnavailable("the host offered no capturable sources".into()));
        }
        log::debug!("host offered {} capturable sources", sources.len());

        if self.mode == HostShellMode::Manual {
            if let Some(selected) = self.host.select_source(&sources).await? {
                sources.retain(|s| s.id != selected.id);
                sources.insert(0, selected);
            }
        }

        self.iterate_sources(sources, context, log).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capability::{CapabilityRecord, PlatformFamily};
    use crate::models::config::CaptureConfig;
    use crate::models::device::DeviceDescriptor;
    use crate::process::SubprocessSlot;
    use crate::test_support::{FakeHostShell, FakeMediaDevices, FakeStream};
    use crate::traits::host_shell::{PermissionState, PermissionStatus};
    use tokio_util::sync::CancellationToken;

    fn source(id: &str, kind: SourceKind) -> CapturableSource {
        CapturableSource {
            id: id.into(),
            name: format!("Source {}", id),
            kind,
        }
    }

    async fn run(strategy: &HostShellStrategy, log: &mut AttemptLog) -> Result<StrategyOutcome, CaptureError> {
        let config = CaptureConfig::default();
        let caps = CapabilityRecord::none(PlatformFamily::Windows);
        let cancel = CancellationToken::new();
        let slot = SubprocessSlot::new();
        let context = StrategyContext {
            config: &config,
            capabilities: &caps,
            cancel: &cancel,
            subprocess: &slot,
        };
        strategy.attempt(&context, log).await
    }

    #[test]
    fn screens_sort_before_windows() {
        let ordered = order_sources(vec![
            source("w1", SourceKind::Window),
            source("s1", SourceKind::Screen),
            source("w2", SourceKind::Window),
            source("s2", SourceKind::Screen),
        ]);
        let ids: Vec<_> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2", "w1", "w2"]);
    }

    #[tokio::test]
    async fn denied_permission_fails_without_listing() {
        let host = Arc::new(FakeHostShell::new().with_permissions(PermissionStatus {
            screen_capture: PermissionState::Denied,
            ..PermissionStatus::granted()
        }));
        let strategy = HostShellStrategy::automatic(host.clone(), None);
        let err = run(&strategy, &mut AttemptLog::new()).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(host.opened_sources(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn selected_window_without_audio_falls_through_to_screen() {
        let host = Arc::new(
            FakeHostShell::new()
                .with_sources(vec![source("w1", SourceKind::Window), source("s1", SourceKind::Screen)])
                .with_source_stream("w1", FakeStream::VideoOnly)
                .with_source_stream("s1", FakeStream::Tone(0.3))
                .with_selection("w1"),
        );
        let strategy = HostShellStrategy::manual(host.clone());
        let mut log = AttemptLog::new();
        let outcome = run(&strategy, &mut log).await.unwrap();

        assert_eq!(outcome.method, "host-shell-manual:screen");
        assert_eq!(host.opened_sources(), ["w1", "s1"]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].strategy, "host-shell-manual[window:Source w1]");
        assert!(matches!(log.entries()[0].error, Some(CaptureError::NoAudioTrack(_))));
        assert!(outcome.stream.video_tracks().next().is_none());
    }

    #[tokio::test]
    async fn automatic_prefers_native_loopback_device() {
        let host = Arc::new(
            FakeHostShell::new()
                .with_native_devices(vec![DeviceDescriptor::input("vb", "CABLE Output (VB-Audio Virtual Cable)")])
                .with_sources(vec![source("s1", SourceKind::Screen)]),
        );
        let media = Arc::new(FakeMediaDevices::new());
        let strategy = HostShellStrategy::automatic(host.clone(), Some(media.clone()));
        let outcome = run(&strategy, &mut AttemptLog::new()).await.unwrap();

        assert_eq!(outcome.method, "host-shell-auto:device");
        assert!(host.opened_sources().is_empty());
        assert_eq!(media.user_media_requests().len(), 1);
    }

    #[tokio::test]
    async fn every_source_silent_is_no_audio_track() {
        let host = Arc::new(
            FakeHostShell::new()
                .with_sources(vec![source("s1", SourceKind::Screen), source("w1", SourceKind::Window)])
                .with_default_stream(FakeStream::VideoOnly),
        );
        let strategy = HostShellStrategy::automatic(host, None);
        let mut log = AttemptLog::new();
        let err = run(&strategy, &mut log).await.unwrap_err();
        assert!(matches!(err, CaptureError::NoAudioTrack(_)));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn no_sources_is_source_unavailable() {
        let strategy = HostShellStrategy::automatic(Arc::new(FakeHostShell::new()), None);
        let err = run(&strategy, &mut AttemptLog::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::SourceUnavailable(_)));
    }
}

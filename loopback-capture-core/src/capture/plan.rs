use std::sync::Arc;

use crate::capture::device::DeviceLoopbackStrategy;
use crate::capture::display::DisplayCaptureStrategy;
use crate::capture::host_shell::HostShellStrategy;
use crate::capture::microphone::MicrophoneStrategy;
use crate::models::capability::CapabilityRecord;
use crate::models::config::CaptureConfig;
use crate::traits::capture_strategy::CaptureStrategy;
use crate::traits::host_shell::HostShell;
use crate::traits::media_devices::MediaDevices;

/// Platform facilities the engine can drive.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub media: Option<Arc<dyn MediaDevices>>,
    pub host: Option<Arc<dyn HostShell>>,
    /// Extra automatic system-audio strategies, tried after device loopback.
    pub platform_strategies: Vec<Arc<dyn CaptureStrategy>>,
}

impl Collaborators {
    pub fn with_media(mut self, media: Arc<dyn MediaDevices>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostShell>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_platform_strategy(mut self, strategy: Arc<dyn CaptureStrategy>) -> Self {
        self.platform_strategies.push(strategy);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("media", &self.media.is_some())
            .field("host", &self.host.is_some())
            .field(
                "platform_strategies",
                &self.platform_strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Build the ordered strategy list for one negotiation.
///
/// Automatic system-audio methods come first, then interactive ones, then
/// the microphone. A strategy is only planned when both the collaborator and
/// the matching capability are present.
pub fn plan_strategies(
    config: &CaptureConfig,
    capabilities: &CapabilityRecord,
    collaborators: &Collaborators,
) -> Vec<Arc<dyn CaptureStrategy>> {
    let mut plan: Vec<Arc<dyn CaptureStrategy>> = Vec::new();
    let user_media = collaborators
        .media
        .as_ref()
        .filter(|m| capabilities.has_user_media && m.supports_user_media());
    let host = collaborators.host.as_ref().filter(|_| capabilities.host_shell);

    if config.prefer_system_audio && config.auto_capture {
        if let Some(media) = user_media {
            plan.push(Arc::new(DeviceLoopbackStrategy::new(Arc::clone(media))));
        }
        plan.extend(collaborators.platform_strategies.iter().cloned());
        if let Some(host) = host {
            plan.push(Arc::new(HostShellStrategy::automatic(Arc::clone(host), user_media.cloned())));
        }
    }

    if config.prefer_system_audio && !config.automatic_only {
        if let Some(host) = host.filter(|_| capabilities.has_desktop_capture_bridge) {
            plan.push(Arc::new(HostShellStrategy::manual(Arc::clone(host))));
        }
        if let Some(media) = collaborators
            .media
            .as_ref()
            .filter(|m| capabilities.has_display_capture && m.supports_display_capture())
        {
            plan.push(Arc::new(DisplayCaptureStrategy::new(Arc::clone(media))));
        }
    }

    if config.allow_microphone_fallback {
        if let Some(media) = user_media {
            plan.push(Arc::new(MicrophoneStrategy::new(Arc::clone(media))));
        }
    }

    log::debug!(
        "capture plan: [{}]",
        plan.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capability::PlatformFamily;
    use crate::test_support::{FakeHostShell, FakeMediaDevices, FakeStrategy};

    fn full_caps() -> CapabilityRecord {
        CapabilityRecord {
            has_desktop_capture_bridge: true,
            has_display_capture: true,
            has_signal_processing_context: true,
            has_recording_interface: true,
            has_user_media: true,
            host_shell: true,
            has_native_loopback_tool: true,
            platform: PlatformFamily::Windows,
        }
    }

    fn everything() -> Collaborators {
        Collaborators::default()
            .with_media(Arc::new(FakeMediaDevices::new()))
            .with_host(Arc::new(FakeHostShell::new()))
            .with_platform_strategy(Arc::new(FakeStrategy::succeeding("native-loopback", true)))
    }

    fn names(plan: &[Arc<dyn CaptureStrategy>]) -> Vec<&str> {
        plan.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn full_environment_plans_every_method_in_order() {
        let plan = plan_strategies(&CaptureConfig::default(), &full_caps(), &everything());
        assert_eq!(
            names(&plan),
            [
                "device-loopback",
                "native-loopback",
                "host-shell-auto",
                "host-shell-manual",
                "display-capture",
                "microphone"
            ]
        );
    }

    #[test]
    fn automatic_only_skips_interactive_methods() {
        let config = CaptureConfig {
            automatic_only: true,
            allow_microphone_fallback: false,
            ..CaptureConfig::default()
        };
        let plan = plan_strategies(&config, &full_caps(), &everything());
        assert_eq!(names(&plan), ["device-loopback", "native-loopback", "host-shell-auto"]);
    }

    #[test]
    fn microphone_only_when_system_audio_not_preferred() {
        let config = CaptureConfig {
            prefer_system_audio: false,
            ..CaptureConfig::default()
        };
        let plan = plan_strategies(&config, &full_caps(), &everything());
        assert_eq!(names(&plan), ["microphone"]);
    }

    #[test]
    fn missing_capabilities_prune_the_plan() {
        let caps = CapabilityRecord {
            host_shell: false,
            has_display_capture: false,
            ..full_caps()
        };
        let plan = plan_strategies(&CaptureConfig::default(), &caps, &everything());
        assert_eq!(names(&plan), ["device-loopback", "native-loopback", "microphone"]);

        let bare = plan_strategies(
            &CaptureConfig::default(),
            &CapabilityRecord::none(PlatformFamily::Linux),
            &Collaborators::default(),
        );
        assert!(bare.is_empty());
    }
}

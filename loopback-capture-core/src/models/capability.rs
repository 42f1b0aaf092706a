use serde::{Deserialize, Serialize};

use crate::traits::environment::EnvironmentProbe;

/// Operating system family the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Windows,
    MacOs,
    Linux,
    Unknown,
}

impl PlatformFamily {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }
}

/// Immutable snapshot of what the running environment can do.
///
/// Computed once by [`CapabilityRecord::detect`] and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRecord {
    pub has_desktop_capture_bridge: bool,
    pub has_display_capture: bool,
    pub has_signal_processing_context: bool,
    pub has_recording_interface: bool,
    pub has_user_media: bool,
    pub host_shell: bool,
    pub has_native_loopback_tool: bool,
    pub platform: PlatformFamily,
}

impl CapabilityRecord {
    /// Query every facility once. Never fails; absent facilities read as `false`.
    pub fn detect(probe: &dyn EnvironmentProbe) -> Self {
        let record = Self {
            has_desktop_capture_bridge: probe.has_desktop_capture_bridge(),
            has_display_capture: probe.has_display_capture(),
            has_signal_processing_context: probe.has_signal_processing_context(),
            has_recording_interface: probe.has_recording_interface(),
            has_user_media: probe.has_user_media(),
            host_shell: probe.has_host_shell(),
            has_native_loopback_tool: probe.has_native_loopback_tool(),
            platform: probe.platform(),
        };
        log::debug!("detected capabilities: {:?}", record);
        record
    }

    /// A record with every facility absent.
    pub fn none(platform: PlatformFamily) -> Self {
        Self {
            has_desktop_capture_bridge: false,
            has_display_capture: false,
            has_signal_processing_context: false,
            has_recording_interface: false,
            has_user_media: false,
            host_shell: false,
            has_native_loopback_tool: false,
            platform,
        }
    }

    /// Whether any system audio method could possibly work here.
    pub fn supports_system_audio(&self) -> bool {
        self.has_user_media || self.host_shell || self.has_display_capture || self.has_native_loopback_tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl EnvironmentProbe for Bare {}

    struct ShellHost;

    impl EnvironmentProbe for ShellHost {
        fn has_host_shell(&self) -> bool {
            true
        }
        fn has_desktop_capture_bridge(&self) -> bool {
            true
        }
        fn has_signal_processing_context(&self) -> bool {
            true
        }
        fn platform(&self) -> PlatformFamily {
            PlatformFamily::Windows
        }
    }

    #[test]
    fn absent_facilities_are_false() {
        let record = CapabilityRecord::detect(&Bare);
        assert_eq!(record, CapabilityRecord::none(PlatformFamily::current()));
        assert!(!record.supports_system_audio());
    }

    #[test]
    fn detect_reads_probe() {
        let record = CapabilityRecord::detect(&ShellHost);
        assert!(record.host_shell);
        assert!(record.has_desktop_capture_bridge);
        assert!(!record.has_display_capture);
        assert_eq!(record.platform, PlatformFamily::Windows);
        assert!(record.supports_system_audio());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(CapabilityRecord::none(PlatformFamily::Linux)).unwrap();
        assert_eq!(json["hostShell"], false);
        assert_eq!(json["platform"], "linux");
    }
}

use crate::models::capability::PlatformFamily;

/// Environment facilities consulted once by capability detection.
///
/// Every query defaults to "absent".
pub trait EnvironmentProbe {
    fn has_desktop_capture_bridge(&self) -> bool {
        false
    }

    fn has_display_capture(&self) -> bool {
        false
    }

    fn has_signal_processing_context(&self) -> bool {
        false
    }

    fn has_recording_interface(&self) -> bool {
        false
    }

    fn has_user_media(&self) -> bool {
        false
    }

    fn has_host_shell(&self) -> bool {
        false
    }

    fn has_native_loopback_tool(&self) -> bool {
        false
    }

    fn platform(&self) -> PlatformFamily {
        PlatformFamily::current()
    }
}

use serde::Serialize;

use crate::models::capability::{CapabilityRecord, PlatformFamily};

/// Method a capture would most likely use, as far as can be told without capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupMethod {
    LoopbackDevice,
    NativeTool,
    HostShell,
    DisplayCapture,
    Microphone,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    pub method: SetupMethod,
    pub device: Option<String>,
    pub instructions: String,
    /// Strategy names in the order they would be attempted.
    pub planned: Vec<String>,
}

impl SetupReport {
    pub fn ready(&self) -> bool {
        self.method != SetupMethod::None
    }
}

pub(crate) fn instructions_for(method: SetupMethod, device: Option<&str>, platform: PlatformFamily) -> String {
    match method {
        SetupMethod::LoopbackDevice => format!(
            "System audio will be captured from \"{}\".",
            device.unwrap_or("the loopback device")
        ),
        SetupMethod::NativeTool => "System audio will be recorded with the native capture tool.".into(),
        SetupMethod::HostShell => {
            "System audio will be captured through the desktop host. Grant screen recording permission when asked."
                .into()
        }
        SetupMethod::DisplayCapture => {
            "When prompted, choose a screen and tick \"Share system audio\".".into()
        }
        SetupMethod::Microphone => {
            "No system audio method is available; the microphone will be used instead.".into()
        }
        SetupMethod::None => missing_setup_instructions(platform).into(),
    }
}

fn missing_setup_instructions(platform: PlatformFamily) -> &'static str {
    match platform {
        PlatformFamily::Windows => {
            "Enable \"Stereo Mix\" in Windows Sound settings or install VB-Cable, then try again."
        }
        PlatformFamily::MacOs => "Install a loopback driver such as BlackHole or Soundflower, then try again.",
        PlatformFamily::Linux => "Select a PulseAudio monitor source (for example with pavucontrol), then try again.",
        PlatformFamily::Unknown => "System audio capture is not available.",
    }
}

/// Choose the setup method from what is known before any capture.
pub(crate) fn choose_method(
    capabilities: &CapabilityRecord,
    loopback_device: Option<&str>,
    has_native_strategy: bool,
    has_host: bool,
    microphone_planned: bool,
) -> SetupMethod {
    if loopback_device.is_some() {
        SetupMethod::LoopbackDevice
    } else if has_native_strategy && capabilities.has_native_loopback_tool {
        SetupMethod::NativeTool
    } else if has_host && capabilities.host_shell {
        SetupMethod::HostShell
    } else if capabilities.has_display_capture {
        SetupMethod::DisplayCapture
    } else if microphone_planned {
        SetupMethod::Microphone
    } else {
        SetupMethod::None
    }
}

//! Parsing of the capture tool's device listing.
//!
//! The tool prints its device list as diagnostic text, in a layout that
//! depends on the input format and the tool version. Lines that do not look
//! like a device entry are skipped.

use loopback_capture_core::models::capability::PlatformFamily;
use loopback_capture_core::models::device::{classify_devices, DeviceDescriptor, DeviceKind};

const DSHOW_AUDIO_MARKER: &str = "DirectShow audio devices";
const DSHOW_VIDEO_MARKER: &str = "DirectShow video devices";
const DSHOW_LINE_TAG: &str = "[dshow @";
const DSHOW_ALTERNATIVE: &str = "Alternative name";
const DSHOW_AUDIO_SUFFIX: &str = "(audio)";
const AVF_AUDIO_MARKER: &str = "AVFoundation audio devices";
const AVF_VIDEO_MARKER: &str = "AVFoundation video devices";
const PULSE_MONITOR_SUFFIX: &str = ".monitor";

/// Input device framework the tool captures through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    DirectShow,
    AvFoundation,
    PulseAudio,
}

impl InputFormat {
    pub fn for_platform(platform: PlatformFamily) -> Option<Self> {
        match platform {
            PlatformFamily::Windows => Some(Self::DirectShow),
            PlatformFamily::MacOs => Some(Self::AvFoundation),
            PlatformFamily::Linux => Some(Self::PulseAudio),
            PlatformFamily::Unknown => None,
        }
    }

    /// Value of the tool's `-f` argument.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectShow => "dshow",
            Self::AvFoundation => "avfoundation",
            Self::PulseAudio => "pulse",
        }
    }

    /// Value of the tool's `-i` argument for a device name.
    pub fn device_spec(self, device: &str) -> String {
        match self {
            Self::DirectShow => format!("audio={}", device),
            // ":<audio>" selects no video device
            Self::AvFoundation => format!(":{}", device),
            Self::PulseAudio => device.to_string(),
        }
    }

    /// Arguments that make the tool print its device list and exit.
    pub fn list_args(self) -> Vec<String> {
        match self {
            Self::PulseAudio => vec!["-hide_banner".into(), "-sources".into(), self.as_str().into()],
            _ => vec![
                "-hide_banner".into(),
                "-list_devices".into(),
                "true".into(),
                "-f".into(),
                self.as_str().into(),
                "-i".into(),
                "dummy".into(),
            ],
        }
    }
}

/// Parse the listing into classified descriptors, in listing order.
pub fn parse_device_list(output: &str, format: InputFormat) -> Vec<DeviceDescriptor> {
    let devices = match format {
        InputFormat::DirectShow => parse_dshow(output),
        InputFormat::AvFoundation => parse_avfoundation(output),
        InputFormat::PulseAudio => parse_pulse(output),
    };
    classify_devices(devices)
}

fn quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    let name = &line[start..start + len];
    (!name.trim().is_empty()).then_some(name)
}

fn parse_dshow(output: &str) -> Vec<DeviceDescriptor> {
    if output.contains(DSHOW_AUDIO_MARKER) {
        return parse_dshow_sections(output);
    }

    // Newer builds list every device in one block, tagged by media type.
    output
        .lines()
        .filter(|line| line.contains(DSHOW_LINE_TAG) && line.trim_end().ends_with(DSHOW_AUDIO_SUFFIX))
        .filter_map(quoted)
        .map(|name| DeviceDescriptor::input(name, name))
        .collect()
}

fn parse_dshow_sections(output: &str) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    let mut in_audio = false;
    for line in output.lines() {
        if line.contains(DSHOW_AUDIO_MARKER) {
            in_audio = true;
            continue;
        }
        if line.contains(DSHOW_VIDEO_MARKER) {
            if in_audio {
                break;
            }
            continue;
        }
        if !in_audio || !line.contains(DSHOW_LINE_TAG) || line.contains(DSHOW_ALTERNATIVE) {
            continue;
        }
        if let Some(name) = quoted(line) {
            devices.push(DeviceDescriptor::input(name, name));
        }
    }
    devices
}

/// `[AVFoundation indev @ 0x..] [0] BlackHole 2ch` yields `BlackHole 2ch`.
fn avfoundation_entry(line: &str) -> Option<&str> {
    let rest = line[line.find("] [")? + 3..].trim_start();
    let close = rest.find(']')?;
    if !rest[..close].chars().all(|c| c.is_ascii_digit()) || close == 0 {
        return None;
    }
    let name = rest[close + 1..].trim();
    (!name.is_empty()).then_some(name)
}

fn parse_avfoundation(output: &str) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    let mut in_audio = false;
    for line in output.lines() {
        if line.contains(AVF_AUDIO_MARKER) {
            in_audio = true;
            continue;
        }
        if line.contains(AVF_VIDEO_MARKER) {
            if in_audio {
                break;
            }
            continue;
        }
        if in_audio {
            if let Some(name) = avfoundation_entry(line) {
                devices.push(DeviceDescriptor::input(name, name));
            }
        }
    }
    devices
}

/// `* alsa_output.pci.monitor [Monitor of Built-in Audio] (none)`
fn parse_pulse(output: &str) -> Vec<DeviceDescriptor> {
    output
        .lines()
        .filter(|line| line.starts_with(' ') || line.starts_with('*'))
        .filter_map(|line| {
            let entry = line.trim().trim_start_matches('*').trim();
            let (id, rest) = entry.split_once(' ').unwrap_or((entry, ""));
            if id.is_empty() {
                return None;
            }
            let label = rest
                .split_once('[')
                .and_then(|(_, tail)| tail.split_once(']'))
                .map(|(label, _)| label.trim())
                .filter(|label| !label.is_empty())
                .unwrap_or(id);
            let kind = if id.ends_with(PULSE_MONITOR_SUFFIX) {
                DeviceKind::LoopbackHint
            } else {
                DeviceKind::Input
            };
            Some(DeviceDescriptor::new(id, label, kind))
        })
        .collect()
}

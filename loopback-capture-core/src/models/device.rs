use serde::{Deserialize, Serialize};

/// Role of an enumerated audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Input,
    Output,
    LoopbackHint,
}

/// An audio endpoint as reported by one enumeration call.
///
/// Produced fresh on every call; device topology can change between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub display_name: String,
    pub kind: DeviceKind,
}

/// Name fragments of mixer devices that carry the system output mix.
///
/// Matched against a normalized name (lowercase, `-`/`_` as spaces). These are
/// human-readable labels, so localized driver names will not match.
pub const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "what u hear",
    "wave out mix",
    "loopback",
    "system audio",
    "virtual cable",
    "vb cable",
    "voicemeeter",
    "voice router",
    "soundflower",
];

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
        }
    }

    pub fn input(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(id, display_name, DeviceKind::Input)
    }

    /// Whether the display name can take part in heuristic classification.
    ///
    /// Enumerating before a permission grant can yield empty labels.
    pub fn has_usable_name(&self) -> bool {
        !self.display_name.trim().is_empty()
    }

    pub fn is_loopback_hint(&self) -> bool {
        self.kind == DeviceKind::LoopbackHint
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect()
}

/// Whether a display name looks like a loopback-capable mixer device.
pub fn is_loopback_name(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    let normalized = normalize_name(name);
    LOOPBACK_KEYWORDS.iter().any(|kw| normalized.contains(kw))
}

/// Mark input devices whose names match the loopback keywords as loopback hints.
///
/// Output endpoints and unnamed devices are left untouched.
pub fn classify_devices(devices: Vec<DeviceDescriptor>) -> Vec<DeviceDescriptor> {
    devices
        .into_iter()
        .map(|mut device| {
            if device.kind == DeviceKind::Input && device.has_usable_name() && is_loopback_name(&device.display_name) {
                device.kind = DeviceKind::LoopbackHint;
            }
            device
        })
        .collect()
}

/// Pick the loopback device to capture from: the first hint in enumeration order.
pub fn select_loopback_device(devices: &[DeviceDescriptor]) -> Option<&DeviceDescriptor> {
    devices.iter().find(|d| {
        d.is_loopback_hint() || (d.kind == DeviceKind::Input && d.has_usable_name() && is_loopback_name(&d.display_name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_mix_selected_over_microphone() {
        let devices = classify_devices(vec![
            DeviceDescriptor::input("1", "Stereo Mix (Realtek)"),
            DeviceDescriptor::input("2", "Microphone Array"),
        ]);
        let selected = select_loopback_device(&devices).unwrap();
        assert_eq!(selected.display_name, "Stereo Mix (Realtek)");
        assert_eq!(devices[1].kind, DeviceKind::Input);
    }

    #[test]
    fn selection_follows_enumeration_order() {
        let devices = vec![
            DeviceDescriptor::input("a", "Microphone"),
            DeviceDescriptor::input("b", "CABLE Output (VB-Cable)"),
            DeviceDescriptor::input("c", "Stereo Mix"),
        ];
        assert_eq!(select_loopback_device(&devices).unwrap().id, "b");
    }

    #[test]
    fn keywords_are_normalized() {
        assert!(is_loopback_name("WHAT-U-HEAR (Sound Blaster)"));
        assert!(is_loopback_name("Wave_Out_Mix"));
        assert!(is_loopback_name("VoiceMeeter Output"));
        assert!(is_loopback_name("Soundflower (2ch)"));
        assert!(!is_loopback_name("USB Headset"));
    }

    #[test]
    fn empty_names_are_unusable() {
        let devices = classify_devices(vec![
            DeviceDescriptor::input("x", ""),
            DeviceDescriptor::input("y", "   "),
        ]);
        assert!(devices.iter().all(|d| d.kind == DeviceKind::Input));
        assert!(select_loopback_device(&devices).is_none());
    }

    #[test]
    fn output_devices_never_hinted() {
        let devices = classify_devices(vec![DeviceDescriptor::new("o", "Loopback Speakers", DeviceKind::Output)]);
        assert_eq!(devices[0].kind, DeviceKind::Output);
        assert!(select_loopback_device(&devices).is_none());
    }
}

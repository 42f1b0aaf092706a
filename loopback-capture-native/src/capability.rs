use cpal::traits::HostTrait;

use loopback_capture_core::{CapabilityRecord, EnvironmentProbe};

use crate::ffmpeg::driver::DEFAULT_PROGRAM;

/// Environment probe for a native process.
///
/// There is no desktop host or display picker outside a desktop shell, so
/// those facilities stay absent. The signal graph and recorder are built in.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    program: String,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the capture tool under a different name or path.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn detect(&self) -> CapabilityRecord {
        CapabilityRecord::detect(self)
    }
}

impl EnvironmentProbe for SystemProbe {
    fn has_signal_processing_context(&self) -> bool {
        true
    }

    fn has_recording_interface(&self) -> bool {
        true
    }

    fn has_user_media(&self) -> bool {
        match cpal::default_host().input_devices() {
            Ok(mut devices) => devices.next().is_some(),
            Err(e) => {
                log::debug!("input enumeration unavailable: {}", e);
                false
            }
        }
    }

    fn has_native_loopback_tool(&self) -> bool {
        match which::which(&self.program) {
            Ok(path) => {
                log::debug!("capture tool found at {}", path.display());
                true
            }
            Err(_) => false,
        }
    }
}

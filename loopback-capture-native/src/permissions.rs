//! Microphone access check.
//!
//! There is no portable permission query for native audio inputs. Windows
//! privacy settings and macOS TCC both surface a refusal as a failure to open
//! the endpoint, so access is probed by building (not playing) a stream on the
//! default input.

use cpal::traits::DeviceTrait;

use loopback_capture_core::PermissionState;

use crate::cpal_devices::find_input_device;

/// Whether the default input device can be opened.
///
/// `NotDetermined` when there is no input device to ask about.
pub fn check_microphone_permission() -> PermissionState {
    let host = cpal::default_host();
    let Ok(device) = find_input_device(&host, None) else {
        return PermissionState::NotDetermined;
    };
    let config = match device.default_input_config() {
        Ok(supported) => supported.config(),
        Err(e) => {
            log::warn!("default input has no usable config: {}", e);
            return PermissionState::Denied;
        }
    };

    match device.build_input_stream(
        &config,
        |_: &[f32], _: &cpal::InputCallbackInfo| {},
        |err| log::debug!("probe stream error: {}", err),
        None,
    ) {
        Ok(_stream) => PermissionState::Granted,
        Err(cpal::BuildStreamError::StreamConfigNotSupported) => {
            // the endpoint answered; only the f32 format was refused
            PermissionState::Granted
        }
        Err(e) => {
            log::warn!("microphone access check failed: {}", e);
            PermissionState::Denied
        }
    }
}

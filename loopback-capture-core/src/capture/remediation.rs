use crate::capture::microphone::MICROPHONE;
use crate::models::attempt::CaptureAttempt;
use crate::models::capability::PlatformFamily;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;

pub const NOTHING_ENABLED: &str = "Unable to capture audio. No capture method is enabled.";

const PERMISSION_REMEDIATION: &str =
    "Please grant screen sharing permission and make sure \"Share system audio\" is selected.";
const CAPTURABILITY_REMEDIATION: &str =
    "The selected screen cannot be captured. Try sharing a different screen or updating your display drivers.";
const DEVICE_REMEDIATION: &str =
    "No system audio devices found. Enable \"Stereo Mix\" in Windows Sound settings or install VB-Cable.";
const GENERIC_REMEDIATION: &str = "System audio capture is not available.";
const MICROPHONE_FAILED: &str = "Microphone fallback also failed. Please check your audio permissions.";
const MICROPHONE_DISALLOWED: &str = "Try enabling microphone fallback or check the audio setup guide.";

/// Dominant failure pattern among the system-audio attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePattern {
    Permission,
    SourceUncapturable,
    DeviceMissing,
    Generic,
}

impl FailurePattern {
    pub fn remediation(self) -> &'static str {
        match self {
            FailurePattern::Permission => PERMISSION_REMEDIATION,
            FailurePattern::SourceUncapturable => CAPTURABILITY_REMEDIATION,
            FailurePattern::DeviceMissing => DEVICE_REMEDIATION,
            FailurePattern::Generic => GENERIC_REMEDIATION,
        }
    }
}

fn is_microphone(attempt: &CaptureAttempt) -> bool {
    attempt.strategy == MICROPHONE
}

/// Permission wins over everything; the capturability and device patterns
/// only apply on Windows, where the remediation copy is known.
pub fn classify_failures(attempts: &[CaptureAttempt], platform: PlatformFamily) -> FailurePattern {
    let errors: Vec<&CaptureError> = attempts
        .iter()
        .filter(|a| !is_microphone(a))
        .filter_map(|a| a.error.as_ref())
        .collect();

    if errors.iter().any(|e| e.is_permission_denied()) {
        return FailurePattern::Permission;
    }
    if platform == PlatformFamily::Windows {
        if errors.iter().any(|e| matches!(e, CaptureError::SourceUnavailable(_))) {
            return FailurePattern::SourceUncapturable;
        }
        if errors.iter().any(|e| matches!(e, CaptureError::DeviceNotFound(_))) {
            return FailurePattern::DeviceMissing;
        }
    }
    FailurePattern::Generic
}

pub fn exhaustion_message(attempts: &[CaptureAttempt], platform: PlatformFamily, config: &CaptureConfig) -> String {
    if attempts.is_empty() {
        return NOTHING_ENABLED.to_string();
    }

    let mut parts = vec!["Unable to capture audio."];
    if attempts.iter().any(|a| !is_microphone(a)) {
        parts.push("System audio capture failed.");
        parts.push(classify_failures(attempts, platform).remediation());
    }
    if attempts.iter().any(|a| is_microphone(a) && a.failed()) {
        parts.push(MICROPHONE_FAILED);
    } else if !config.allow_microphone_fallback {
        parts.push(MICROPHONE_DISALLOWED);
    }
    parts.join(" ")
}

/// The aggregated error raised when every planned strategy failed.
pub fn exhausted(attempts: Vec<CaptureAttempt>, platform: PlatformFamily, config: &CaptureConfig) -> CaptureError {
    let message = exhaustion_message(&attempts, platform, config);
    log::error!("capture exhausted after {} attempts: {}", attempts.len(), message);
    CaptureError::CaptureExhausted { message, attempts }
}

use thiserror::Error;

use loopback_capture_core::CaptureError;

/// Failures of the external capture tool and its plumbing.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{program} not found on PATH")]
    ToolMissing { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} is not usable: version check exited with status {code}")]
    ToolUnusable { program: String, code: i32, diagnostics: String },

    #[error("{program} exited with status {code}")]
    Exited { program: String, code: i32, diagnostics: String },

    #[error("{program} did not finish within {secs:.1}s")]
    TimedOut { program: String, secs: f64, diagnostics: String },

    #[error("capture cancelled")]
    Cancelled,

    #[error("no capture device available for {format}")]
    NoDevice { format: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Captured stderr of the tool, when the failure came from a run.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            DriverError::ToolUnusable { diagnostics, .. }
            | DriverError::Exited { diagnostics, .. }
            | DriverError::TimedOut { diagnostics, .. } => {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }
}

impl From<DriverError> for CaptureError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ToolMissing { .. } | DriverError::Spawn { .. } | DriverError::ToolUnusable { .. } => {
                CaptureError::ToolUnavailable(err.to_string())
            }
            DriverError::Exited { ref diagnostics, .. } | DriverError::TimedOut { ref diagnostics, .. } => {
                CaptureError::CaptureSubprocessError {
                    message: err.to_string(),
                    diagnostics: diagnostics.clone(),
                }
            }
            DriverError::Cancelled => CaptureError::Cancelled,
            DriverError::NoDevice { .. } => CaptureError::DeviceNotFound(err.to_string()),
            DriverError::Io(e) => CaptureError::StorageError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_maps_to_tool_unavailable() {
        let err: CaptureError = DriverError::ToolMissing { program: "ffmpeg".into() }.into();
        assert_eq!(err, CaptureError::ToolUnavailable("ffmpeg not found on PATH".into()));
    }

    #[test]
    fn exit_keeps_diagnostics() {
        let err: CaptureError = DriverError::Exited {
            program: "ffmpeg".into(),
            code: 1,
            diagnostics: "Could not find audio device".into(),
        }
        .into();
        match err {
            CaptureError::CaptureSubprocessError { message, diagnostics } => {
                assert!(message.contains("status 1"));
                assert_eq!(diagnostics, "Could not find audio device");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failed_version_check_maps_to_tool_unavailable() {
        let err = DriverError::ToolUnusable {
            program: "ffmpeg".into(),
            code: 1,
            diagnostics: "error while loading shared libraries".into(),
        };
        assert_eq!(err.diagnostics(), Some("error while loading shared libraries"));
        match CaptureError::from(err) {
            CaptureError::ToolUnavailable(message) => assert!(message.contains("not usable")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_listing_maps_to_device_not_found() {
        let err: CaptureError = DriverError::NoDevice { format: "pulse" }.into();
        assert_eq!(err, CaptureError::DeviceNotFound("no capture device available for pulse".into()));
    }

    #[test]
    fn cancellation_is_preserved() {
        assert_eq!(CaptureError::from(DriverError::Cancelled), CaptureError::Cancelled);
    }
}

use tokio::process::Child;

use loopback_capture_core::{CaptureError, ProcessHandle};

/// A running capture tool, supervised through [`ProcessHandle`].
///
/// Graceful stop is SIGTERM on unix so the tool can finalize its output file.
/// Elsewhere there is no portable graceful signal and both phases kill.
pub struct ToolProcess {
    child: Child,
    program: String,
}

impl ToolProcess {
    pub fn new(child: Child, program: impl Into<String>) -> Self {
        Self {
            child,
            program: program.into(),
        }
    }

    fn exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

impl ProcessHandle for ToolProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn request_stop(&mut self) -> Result<(), CaptureError> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            log::debug!("sent SIGTERM to {} (pid {})", self.program, pid);
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(CaptureError::CaptureSubprocessError {
            message: format!("failed to signal {}: {}", self.program, err),
            diagnostics: String::new(),
        })
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) -> Result<(), CaptureError> {
        self.force_stop()
    }

    fn force_stop(&mut self) -> Result<(), CaptureError> {
        if self.exited() {
            return Ok(());
        }
        self.child.start_kill().map_err(|e| CaptureError::CaptureSubprocessError {
            message: format!("failed to kill {}: {}", self.program, e),
            diagnostics: String::new(),
        })?;
        log::warn!("killed {} (pid {:?})", self.program, self.child.id());
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>, CaptureError> {
        let status = self.child.try_wait().map_err(|e| CaptureError::CaptureSubprocessError {
            message: format!("failed to poll {}: {}", self.program, e),
            diagnostics: String::new(),
        })?;
        Ok(status.map(|s| s.code().unwrap_or(-1)))
    }
}

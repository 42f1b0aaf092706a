use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::process_handle::ProcessHandle;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    AlreadyExited,
    Graceful,
    Forced,
}

/// Two-phase stop: request exit, wait out the grace period, then kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub grace_period: Duration,
    pub poll_interval: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TerminationPolicy {
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self {
            grace_period,
            ..Self::default()
        }
    }

    pub async fn terminate(&self, process: &mut dyn ProcessHandle) -> Result<TerminationOutcome, CaptureError> {
        if process.try_wait()?.is_some() {
            return Ok(TerminationOutcome::AlreadyExited);
        }
        if let Err(e) = process.request_stop() {
            log::warn!("graceful stop request failed for {:?}: {}", process.id(), e);
        }

        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            if process.try_wait()?.is_some() {
                log::debug!("process {:?} exited within grace period", process.id());
                return Ok(TerminationOutcome::Graceful);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        self.force(process)
    }

    /// Blocking variant for teardown paths that cannot await.
    pub fn terminate_blocking(&self, process: &mut dyn ProcessHandle) -> Result<TerminationOutcome, CaptureError> {
        if process.try_wait()?.is_some() {
            return Ok(TerminationOutcome::AlreadyExited);
        }
        if let Err(e) = process.request_stop() {
            log::warn!("graceful stop request failed for {:?}: {}", process.id(), e);
        }

        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            if process.try_wait()?.is_some() {
                return Ok(TerminationOutcome::Graceful);
            }
            std::thread::sleep(self.poll_interval);
        }
        self.force(process)
    }

    fn force(&self, process: &mut dyn ProcessHandle) -> Result<TerminationOutcome, CaptureError> {
        if process.try_wait()?.is_some() {
            return Ok(TerminationOutcome::Graceful);
        }
        log::warn!(
            "process {:?} ignored stop request for {:?}, killing",
            process.id(),
            self.grace_period
        );
        process.force_stop()?;
        Ok(TerminationOutcome::Forced)
    }
}

/// Shared slot holding the in-flight capture subprocess, if any.
///
/// The driver installs the handle while it runs; session teardown takes it
/// out and terminates it. At most one subprocess per session.
#[derive(Clone, Default)]
pub struct SubprocessSlot {
    inner: Arc<Mutex<Option<Box<dyn ProcessHandle>>>>,
}

impl SubprocessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handle. A previous occupant is returned to the caller.
    pub fn install(&self, handle: Box<dyn ProcessHandle>) -> Option<Box<dyn ProcessHandle>> {
        self.inner.lock().replace(handle)
    }

    pub fn take(&self) -> Option<Box<dyn ProcessHandle>> {
        self.inner.lock().take()
    }

    pub fn is_occupied(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Run `f` against the installed handle without removing it.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn ProcessHandle) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        guard.as_mut().map(|handle| f(handle.as_mut()))
    }
}

impl std::fmt::Debug for SubprocessSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

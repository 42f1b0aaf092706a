use crate::models::error::CaptureError;

/// Handle to an external process supervised by the engine.
///
/// Independent of the concrete signal mechanism; see
/// [`TerminationPolicy`](crate::process::TerminationPolicy) for the
/// two-phase stop built on top of it.
pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM or the platform equivalent).
    fn request_stop(&mut self) -> Result<(), CaptureError>;

    /// Kill the process immediately.
    fn force_stop(&mut self) -> Result<(), CaptureError>;

    /// Exit code if the process has exited. Signal deaths report -1.
    fn try_wait(&mut self) -> Result<Option<i32>, CaptureError>;
}

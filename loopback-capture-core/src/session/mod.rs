pub mod capture_session;
pub mod engine;
pub mod setup;

pub use capture_session::{CaptureSession, SessionControl, TeardownStep};
pub use engine::CaptureEngine;
pub use setup::{SetupMethod, SetupReport};

pub mod capture_provider;
pub mod capture_strategy;
pub mod encoder;
pub mod environment;
pub mod host_shell;
pub mod media_devices;
pub mod process_handle;
pub mod session_delegate;
pub mod transcriber;

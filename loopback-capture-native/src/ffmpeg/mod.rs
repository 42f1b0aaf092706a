//! External-tool loopback recording.
//!
//! Used where no in-process loopback method exists: ffmpeg records a
//! fixed-duration clip from a DirectShow, AVFoundation or PulseAudio input,
//! which the [`NativeLoopbackStrategy`] then replays into the capture session.

pub mod device_list;
pub mod driver;
pub mod process;
pub mod strategy;

pub use device_list::{parse_device_list, InputFormat};
pub use driver::{DriverOptions, NativeLoopbackDriver};
pub use process::ToolProcess;
pub use strategy::{NativeLoopbackStrategy, NATIVE_LOOPBACK};

//! # loopback-capture-native
//!
//! Native backends for loopback-capture-core.
//!
//! Provides:
//! - `NativeLoopbackDriver` / `NativeLoopbackStrategy`: fixed-duration system
//!   audio recording through ffmpeg (DirectShow, AVFoundation, PulseAudio)
//! - `CpalMediaDevices`: input endpoints via cpal, for device loopback and microphone capture
//! - `SystemProbe`: environment probe feeding capability detection
//! - `permissions`: microphone access check
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use loopback_capture_core::{CaptureConfig, CaptureEngine, Collaborators};
//! use loopback_capture_native::{CpalMediaDevices, NativeLoopbackDriver, NativeLoopbackStrategy, SystemProbe};
//!
//! let mut collaborators = Collaborators::default().with_media(Arc::new(CpalMediaDevices::new()));
//! if let Some(driver) = NativeLoopbackDriver::for_current_platform() {
//!     collaborators = collaborators.with_platform_strategy(Arc::new(NativeLoopbackStrategy::new(driver)));
//! }
//! let mut engine = CaptureEngine::new(SystemProbe::new().detect(), collaborators);
//! let payload = engine.capture_once(CaptureConfig { duration_secs: 10, ..Default::default() }, None).await?;
//! ```

pub mod capability;
pub mod cpal_devices;
pub mod error;
pub mod ffmpeg;
pub mod permissions;

pub use capability::SystemProbe;
pub use cpal_devices::{CpalInputProvider, CpalMediaDevices};
pub use error::DriverError;
pub use ffmpeg::{DriverOptions, InputFormat, NativeLoopbackDriver, NativeLoopbackStrategy};

use std::sync::Arc;

use crate::models::device::DeviceDescriptor;
use crate::models::error::CaptureError;

/// Callback invoked when an audio buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of channels (1 = mono, 2 = stereo interleaved).
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// A native sample source backing a media stream.
///
/// Implemented by the cpal input endpoint, the replayed native-tool clip and
/// test tone generators.
pub trait CaptureProvider: Send + Sync {
    /// Whether this capture source is currently available.
    fn is_available(&self) -> bool;

    /// Start capturing audio, delivering buffers via `callback`.
    ///
    /// The callback fires on a dedicated audio thread; keep processing minimal.
    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError>;

    /// Stop capturing and release resources. Must be safe to call repeatedly.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Information about the device backing this provider.
    fn device_info(&self) -> DeviceDescriptor;

    /// Whether a finite source has delivered all of its audio.
    fn is_finished(&self) -> bool {
        false
    }
}

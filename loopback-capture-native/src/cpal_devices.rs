//! Native audio endpoints through cpal.
//!
//! Input endpoints serve both the microphone strategy and the device-loopback
//! strategy (mixer inputs such as Stereo Mix or a PulseAudio monitor). cpal
//! exposes no stable endpoint ids, so the endpoint name doubles as the id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;

use loopback_capture_core::{
    AudioBufferCallback, CaptureError, CaptureProvider, DeviceDescriptor, DeviceKind, MediaConstraints, MediaDevices,
    MediaStream,
};

const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) fn i16_sample(sample: i16) -> f32 {
    f32::from(sample) / 32_768.0
}

pub(crate) fn u16_sample(sample: u16) -> f32 {
    (f32::from(sample) - 32_768.0) / 32_768.0
}

/// Find an input endpoint by name, or the default input when `name` is `None`.
pub(crate) fn find_input_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let Some(name) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("no default input device".into()));
    };
    let mut devices = host
        .input_devices()
        .map_err(|e| CaptureError::EnumerationError(e.to_string()))?;
    devices
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| CaptureError::DeviceNotFound(format!("no input device named {:?}", name)))
}

fn device_label(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown Device".to_string())
}

fn list_endpoints() -> Result<Vec<DeviceDescriptor>, CaptureError> {
    let host = cpal::default_host();
    let mut endpoints = Vec::new();
    let inputs = host
        .input_devices()
        .map_err(|e| CaptureError::EnumerationError(e.to_string()))?;
    for device in inputs {
        match device.name() {
            Ok(name) => endpoints.push(DeviceDescriptor::input(name.clone(), name)),
            Err(e) => log::debug!("skipping unnamed input device: {}", e),
        }
    }
    if let Some(output) = host.default_output_device() {
        if let Ok(name) = output.name() {
            endpoints.push(DeviceDescriptor::new(name.clone(), name, DeviceKind::Output));
        }
    }
    log::debug!("{} host: {} audio endpoints", host.id().name(), endpoints.len());
    Ok(endpoints)
}

fn stream_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotFound("input device went away".into()),
        other => CaptureError::SourceUnavailable(format!("failed to open input stream: {}", other)),
    }
}

/// Build and start an input stream that converts every buffer to f32.
pub(crate) fn open_input_stream(
    device: &cpal::Device,
    callback: AudioBufferCallback,
) -> Result<cpal::Stream, CaptureError> {
    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::SourceUnavailable(format!("no usable input config: {}", e)))?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let rate = f64::from(config.sample_rate.0);
    let channels = config.channels;
    log::debug!(
        "input config for {}: format={:?} rate={} channels={}",
        device_label(device),
        format,
        rate,
        channels
    );

    let err_fn = |err: cpal::StreamError| log::error!("input stream error: {}", err);
    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data, rate, channels),
            err_fn,
            None,
        ),
        SampleFormat::I16 => {
            let mut converted = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    converted.clear();
                    converted.extend(data.iter().copied().map(i16_sample));
                    callback(&converted, rate, channels);
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let mut converted = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    converted.clear();
                    converted.extend(data.iter().copied().map(u16_sample));
                    callback(&converted, rate, channels);
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(CaptureError::SourceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(stream_error)?;

    stream
        .play()
        .map_err(|e| CaptureError::SourceUnavailable(format!("failed to start input stream: {}", e)))?;
    Ok(stream)
}

/// An input endpoint captured on a dedicated thread.
///
/// cpal streams are not `Send` on every backend, so the stream is built,
/// played and dropped on the capture thread itself.
pub struct CpalInputProvider {
    device_name: Option<String>,
    label: String,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalInputProvider {
    /// `device_name` of `None` captures the default input.
    pub fn new(device_name: Option<String>, label: impl Into<String>) -> Self {
        Self {
            device_name,
            label: label.into(),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }
}

impl CaptureProvider for CpalInputProvider {
    fn is_available(&self) -> bool {
        find_input_device(&cpal::default_host(), self.device_name.as_deref()).is_ok()
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed("input capture already running".into()));
        }
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-input".into())
            .spawn(move || {
                let opened = find_input_device(&cpal::default_host(), device_name.as_deref())
                    .and_then(|device| open_input_stream(&device, callback));
                let stream = match opened {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        running.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while running.load(Ordering::SeqCst) {
                    thread::sleep(STREAM_POLL_INTERVAL);
                }
                drop(stream);
                log::debug!("input stream closed");
            })
            .map_err(|e| CaptureError::SourceUnavailable(format!("failed to spawn input thread: {}", e)))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::SourceUnavailable("input thread exited early".into())));
        if let Err(e) = ready {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        *self.capture_handle.lock() = Some(handle);
        log::info!("capturing from input {:?}", self.label);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> DeviceDescriptor {
        let id = self.device_name.clone().unwrap_or_else(|| "default".into());
        DeviceDescriptor::input(id, self.label.clone())
    }
}

impl Drop for CpalInputProvider {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// [`MediaDevices`] backed by the default cpal host.
///
/// Voice-processing constraints are not available natively; inputs are
/// always captured unprocessed. Display capture is not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalMediaDevices;

impl CpalMediaDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for CpalMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        tokio::task::spawn_blocking(list_endpoints)
            .await
            .map_err(|e| CaptureError::EnumerationError(format!("enumeration task failed: {}", e)))?
    }

    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError> {
        let audio = constraints
            .audio
            .as_ref()
            .ok_or_else(|| CaptureError::NoAudioTrack("no audio was requested".into()))?;
        if constraints.wants_video() {
            log::debug!("native inputs carry no video; ignoring video constraints");
        }
        if !audio.is_raw() {
            log::debug!("voice processing is unavailable on native inputs");
        }

        let requested = audio.device_id.clone();
        let label = tokio::task::spawn_blocking(move || {
            find_input_device(&cpal::default_host(), requested.as_deref()).map(|device| device_label(&device))
        })
        .await
        .map_err(|e| CaptureError::SourceUnavailable(format!("device lookup failed: {}", e)))??;

        let provider = CpalInputProvider::new(audio.device_id.clone(), label);
        Ok(MediaStream::from_provider(Box::new(provider)))
    }

    async fn get_display_media(&self, _constraints: &MediaConstraints) -> Result<MediaStream, CaptureError> {
        Err(CaptureError::SourceUnavailable(
            "display capture is not available through native audio endpoints".into(),
        ))
    }
}

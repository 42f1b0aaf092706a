//! Fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::media::clip::ClipProvider;
use crate::media::constraints::MediaConstraints;
use crate::media::stream::{MediaStream, MediaTrack};
use crate::models::attempt::AttemptLog;
use crate::models::device::{DeviceDescriptor, DeviceKind};
use crate::models::error::CaptureError;
use crate::traits::capture_provider::{AudioBufferCallback, CaptureProvider};
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext, StrategyOutcome};
use crate::traits::host_shell::{CapturableSource, HostShell, PermissionStatus};
use crate::traits::media_devices::MediaDevices;
use crate::traits::process_handle::ProcessHandle;

const TONE_RATE: u32 = 48000;
const TONE_CHANNELS: u16 = 2;
const TONE_HZ: f32 = 440.0;

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn sine(amplitude: f32, frames: usize, start_frame: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * usize::from(TONE_CHANNELS));
    for i in 0..frames {
        let t = (start_frame + i) as f32 / TONE_RATE as f32;
        let v = amplitude * (2.0 * PI * TONE_HZ * t).sin();
        for _ in 0..TONE_CHANNELS {
            out.push(v);
        }
    }
    out
}

/// Observes a [`ToneProvider`] after it has been boxed into a stream.
#[derive(Clone, Default)]
pub struct ToneProbe {
    running: Arc<AtomicBool>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ToneProbe {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Endless 440 Hz stereo sine at 48 kHz, delivered in 10 ms chunks.
pub struct ToneProvider {
    amplitude: f32,
    probe: ToneProbe,
    handle: Option<thread::JoinHandle<()>>,
}

impl ToneProvider {
    pub fn new(amplitude: f32) -> Self {
        Self {
            amplitude,
            probe: ToneProbe::default(),
            handle: None,
        }
    }

    pub fn probe(&self) -> ToneProbe {
        self.probe.clone()
    }
}

impl CaptureProvider for ToneProvider {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.probe.is_running() {
            return Err(CaptureError::ConfigurationFailed("tone already running".into()));
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.probe.running);
        let amplitude = self.amplitude;
        let frames = (TONE_RATE / 100) as usize;
        let handle = thread::Builder::new()
            .name("test-tone".into())
            .spawn(move || {
                let mut frame = 0;
                while running.load(Ordering::SeqCst) {
                    callback(&sine(amplitude, frames, frame), f64::from(TONE_RATE), TONE_CHANNELS);
                    frame += frames;
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> DeviceDescriptor {
        DeviceDescriptor::new("tone", "Test Tone", DeviceKind::Input)
    }
}

/// What a fake collaborator hands back when asked for a stream.
#[derive(Debug, Clone)]
pub enum FakeStream {
    Tone(f32),
    ToneWithVideo(f32),
    /// A finite clip of the given length in seconds, replayed quickly.
    Finite(f64),
    VideoOnly,
    Fail(CaptureError),
}

impl FakeStream {
    pub fn open(&self) -> Result<MediaStream, CaptureError> {
        match self {
            FakeStream::Tone(amplitude) => Ok(MediaStream::from_provider(Box::new(ToneProvider::new(*amplitude)))),
            FakeStream::ToneWithVideo(amplitude) => {
                Ok(MediaStream::new(vec![MediaTrack::video("screen"), MediaTrack::audio("system")])
                    .with_provider(Box::new(ToneProvider::new(*amplitude))))
            }
            FakeStream::Finite(seconds) => {
                let frames = (f64::from(TONE_RATE) * seconds) as usize;
                let clip = ClipProvider::new("clip", sine(0.3, frames, 0), TONE_RATE, TONE_CHANNELS)
                    .with_pacing(Duration::from_millis(2));
                Ok(MediaStream::from_provider(Box::new(clip)))
            }
            FakeStream::VideoOnly => Ok(MediaStream::new(vec![MediaTrack::video("screen")])),
            FakeStream::Fail(error) => Err(error.clone()),
        }
    }
}

pub struct FakeMediaDevices {
    devices: Vec<DeviceDescriptor>,
    user_media: FakeStream,
    display: Mutex<VecDeque<FakeStream>>,
    display_supported: bool,
    user_requests: Mutex<Vec<MediaConstraints>>,
    display_requests: Mutex<Vec<MediaConstraints>>,
}

impl FakeMediaDevices {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            user_media: FakeStream::Tone(0.3),
            display: Mutex::new(VecDeque::new()),
            display_supported: true,
            user_requests: Mutex::new(Vec::new()),
            display_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_devices(mut self, devices: Vec<DeviceDescriptor>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_user_media(mut self, stream: FakeStream) -> Self {
        self.user_media = stream;
        self
    }

    /// Responses to successive display-capture prompts.
    pub fn with_display(self, responses: Vec<FakeStream>) -> Self {
        *self.display.lock() = responses.into();
        self
    }

    pub fn without_display_capture(mut self) -> Self {
        self.display_supported = false;
        self
    }

    pub fn user_media_requests(&self) -> Vec<MediaConstraints> {
        self.user_requests.lock().clone()
    }

    pub fn display_requests(&self) -> Vec<MediaConstraints> {
        self.display_requests.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(self.devices.clone())
    }

    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError> {
        self.user_requests.lock().push(constraints.clone());
        self.user_media.open()
    }

    async fn get_display_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, CaptureError> {
        self.display_requests.lock().push(constraints.clone());
        let response = self.display.lock().pop_front();
        match response {
            Some(stream) => stream.open(),
            None => Err(CaptureError::PermissionDenied("share prompt dismissed".into())),
        }
    }

    fn supports_display_capture(&self) -> bool {
        self.display_supported
    }
}

pub struct FakeHostShell {
    permissions: PermissionStatus,
    sources: Vec<CapturableSource>,
    source_streams: HashMap<String, FakeStream>,
    default_stream: FakeStream,
    native_devices: Vec<DeviceDescriptor>,
    selection: Option<String>,
    opened: Mutex<Vec<String>>,
}

impl FakeHostShell {
    pub fn new() -> Self {
        Self {
            permissions: PermissionStatus::granted(),
            sources: Vec::new(),
            source_streams: HashMap::new(),
            default_stream: FakeStream::Tone(0.3),
            native_devices: Vec::new(),
            selection: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionStatus) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_sources(mut self, sources: Vec<CapturableSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_source_stream(mut self, id: &str, stream: FakeStream) -> Self {
        self.source_streams.insert(id.to_string(), stream);
        self
    }

    pub fn with_default_stream(mut self, stream: FakeStream) -> Self {
        self.default_stream = stream;
        self
    }

    pub fn with_native_devices(mut self, devices: Vec<DeviceDescriptor>) -> Self {
        self.native_devices = devices;
        self
    }

    /// The source the user "picks" in the host's picker.
    pub fn with_selection(mut self, id: &str) -> Self {
        self.selection = Some(id.to_string());
        self
    }

    /// Ids of the sources opened so far, in order.
    pub fn opened_sources(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl HostShell for FakeHostShell {
    async fn list_capturable_sources(&self) -> Result<Vec<CapturableSource>, CaptureError> {
        Ok(self.sources.clone())
    }

    async fn check_audio_permission(&self) -> Result<PermissionStatus, CaptureError> {
        Ok(self.permissions)
    }

    async fn request_audio_permission(&self) -> Result<PermissionStatus, CaptureError> {
        Ok(self.permissions)
    }

    async fn open_source_stream(
        &self,
        source: &CapturableSource,
        _constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.opened.lock().push(source.id.clone());
        self.source_streams
            .get(&source.id)
            .unwrap_or(&self.default_stream)
            .open()
    }

    async fn list_native_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        Ok(self.native_devices.clone())
    }

    async fn select_source(&self, sources: &[CapturableSource]) -> Result<Option<CapturableSource>, CaptureError> {
        Ok(self
            .selection
            .as_ref()
            .and_then(|id| sources.iter().find(|s| &s.id == id).cloned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopBehaviour {
    Honours,
    Ignores,
    Exited,
}

/// Shared view of a [`FakeProcess`] once it has been handed off.
#[derive(Clone, Default)]
pub struct FakeProcessProbe {
    exited: Arc<AtomicBool>,
    stop_requests: Arc<AtomicUsize>,
    killed: Arc<AtomicBool>,
}

impl FakeProcessProbe {
    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

pub struct FakeProcess {
    behaviour: StopBehaviour,
    probe: FakeProcessProbe,
}

impl FakeProcess {
    fn with_behaviour(behaviour: StopBehaviour) -> Self {
        let probe = FakeProcessProbe::default();
        probe.exited.store(behaviour == StopBehaviour::Exited, Ordering::SeqCst);
        Self { behaviour, probe }
    }

    pub fn honours_stop() -> Self {
        Self::with_behaviour(StopBehaviour::Honours)
    }

    pub fn ignores_stop() -> Self {
        Self::with_behaviour(StopBehaviour::Ignores)
    }

    pub fn exited() -> Self {
        Self::with_behaviour(StopBehaviour::Exited)
    }

    pub fn probe(&self) -> FakeProcessProbe {
        self.probe.clone()
    }

    pub fn stop_requests(&self) -> usize {
        self.probe.stop_requests()
    }

    pub fn was_killed(&self) -> bool {
        self.probe.was_killed()
    }
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn request_stop(&mut self) -> Result<(), CaptureError> {
        self.probe.stop_requests.fetch_add(1, Ordering::SeqCst);
        if self.behaviour == StopBehaviour::Honours {
            self.probe.exited.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn force_stop(&mut self) -> Result<(), CaptureError> {
        self.probe.killed.store(true, Ordering::SeqCst);
        self.probe.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>, CaptureError> {
        if !self.probe.has_exited() {
            return Ok(None);
        }
        Ok(Some(if self.probe.was_killed() { -1 } else { 0 }))
    }
}

enum StrategyBehaviour {
    Open(FakeStream),
    Pending,
}

/// Scripted cascade entry.
pub struct FakeStrategy {
    name: String,
    system_audio: bool,
    behaviour: StrategyBehaviour,
    process: Mutex<Option<FakeProcess>>,
    calls: AtomicUsize,
}

impl FakeStrategy {
    fn build(name: &str, system_audio: bool, behaviour: StrategyBehaviour) -> Self {
        Self {
            name: name.to_string(),
            system_audio,
            behaviour,
            process: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(name: &str, system_audio: bool) -> Self {
        Self::build(name, system_audio, StrategyBehaviour::Open(FakeStream::Tone(0.3)))
    }

    pub fn with_stream(name: &str, system_audio: bool, stream: FakeStream) -> Self {
        Self::build(name, system_audio, StrategyBehaviour::Open(stream))
    }

    pub fn failing(name: &str, error: CaptureError) -> Self {
        Self::build(name, true, StrategyBehaviour::Open(FakeStream::Fail(error)))
    }

    pub fn without_audio(name: &str) -> Self {
        Self::build(name, true, StrategyBehaviour::Open(FakeStream::VideoOnly))
    }

    /// Never completes, like a prompt the user ignores.
    pub fn pending(name: &str) -> Self {
        Self::build(name, false, StrategyBehaviour::Pending)
    }

    /// Publish `process` into the session's subprocess slot when attempted.
    pub fn publishing(self, process: FakeProcess) -> Self {
        *self.process.lock() = Some(process);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureStrategy for FakeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn automatic(&self) -> bool {
        true
    }

    fn is_system_audio(&self) -> bool {
        self.system_audio
    }

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        _log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let process = self.process.lock().take();
        if let Some(process) = process {
            context.subprocess.install(Box::new(process));
        }
        match &self.behaviour {
            StrategyBehaviour::Open(stream) => Ok(StrategyOutcome::new(stream.open()?, self.name.clone())),
            StrategyBehaviour::Pending => std::future::pending().await,
        }
    }
}

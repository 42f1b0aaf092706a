use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::capture::cascade::run_cascade;
use crate::encoding::EncoderRegistry;
use crate::media::stream::MediaStream;
use crate::models::attempt::CaptureAttempt;
use crate::models::capability::CapabilityRecord;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::levels::AudioLevels;
use crate::models::payload::{CapturePayload, PayloadOrigin};
use crate::models::state::{Outcome, SessionState};
use crate::monitor::level_monitor::{LevelCallback, LevelMonitor};
use crate::process::{SubprocessSlot, TerminationOutcome, TerminationPolicy};
use crate::processing::graph::{ProcessingContext, SignalGraph};
use crate::recorder::{Recorder, RecorderOptions};
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext};
use crate::traits::session_delegate::SessionDelegate;

/// How often `run` refreshes the duration and checks for the end of input.
const RUN_TICK: Duration = Duration::from_millis(50);

/// A resource released during cleanup, in the order it was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Recorder,
    Monitor,
    Graph,
    Tracks,
    Subprocess,
    Context,
}

/// Handle for stopping or cancelling a session from another task.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    stop: CancellationToken,
    cancel: CancellationToken,
}

impl SessionControl {
    /// Ask a running recording to finish and produce its payload.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Abort negotiation or recording; no payload is produced.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }
}

struct Shared {
    state: SessionState,
    levels: AudioLevels,
}

/// One capture lifecycle: negotiation, recording and teardown.
///
/// The session owns every native resource it acquires and releases them in
/// reverse order on `cleanup`, which runs on every terminal path and again
/// on drop.
pub struct CaptureSession {
    id: String,
    config: CaptureConfig,
    capabilities: CapabilityRecord,
    strategies: Vec<Arc<dyn CaptureStrategy>>,
    registry: EncoderRegistry,
    delegate: Option<Arc<dyn SessionDelegate>>,
    termination: TerminationPolicy,
    control: SessionControl,
    shared: Arc<Mutex<Shared>>,

    context: Option<ProcessingContext>,
    subprocess: SubprocessSlot,
    stream: Option<MediaStream>,
    graph: Option<SignalGraph>,
    monitor: Option<LevelMonitor>,
    recorder: Option<Recorder>,

    method: Option<String>,
    is_system_audio: bool,
    attempts: Vec<CaptureAttempt>,
    recording_started: Option<Instant>,
    outcome: Option<Outcome>,
    teardown: Vec<TeardownStep>,
}

impl CaptureSession {
    pub fn new(
        config: CaptureConfig,
        capabilities: CapabilityRecord,
        strategies: Vec<Arc<dyn CaptureStrategy>>,
        registry: EncoderRegistry,
    ) -> Result<Self, CaptureError> {
        config.validate()?;

        let context = match ProcessingContext::new(&capabilities, config.sample_rate) {
            Ok(context) => Some(context),
            Err(e) => {
                log::warn!("{}; levels and gain will be unavailable", e);
                None
            }
        };

        let id = uuid::Uuid::new_v4().to_string();
        log::debug!("capture session {} created with {} strategies", id, strategies.len());
        Ok(Self {
            id,
            config,
            capabilities,
            strategies,
            registry,
            delegate: None,
            termination: TerminationPolicy::default(),
            control: SessionControl::default(),
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Idle,
                levels: AudioLevels::default(),
            })),
            context,
            subprocess: SubprocessSlot::new(),
            stream: None,
            graph: None,
            monitor: None,
            recorder: None,
            method: None,
            is_system_audio: false,
            attempts: Vec::new(),
            recording_started: None,
            outcome: None,
            teardown: Vec::new(),
        })
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn SessionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.shared.lock().levels.clone()
    }

    /// Capture method of the negotiated stream, e.g. `host-shell-manual:screen`.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn is_system_audio(&self) -> bool {
        self.is_system_audio
    }

    /// Attempt log of the last negotiation.
    pub fn attempts(&self) -> &[CaptureAttempt] {
        &self.attempts
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(LevelMonitor::is_running)
    }

    pub fn has_subprocess(&self) -> bool {
        self.subprocess.is_occupied()
    }

    pub fn has_processing_context(&self) -> bool {
        self.context.as_ref().is_some_and(ProcessingContext::is_open)
    }

    pub fn teardown_steps(&self) -> &[TeardownStep] {
        &self.teardown
    }

    /// Adjust gain while attached or recording. `None` in degraded mode.
    pub fn set_gain(&self, gain: f32) -> Option<f32> {
        let applied = self.graph.as_ref()?.set_gain(gain)?;
        log::debug!("session {} gain set to {:.2}", self.id, applied);
        Some(applied)
    }

    /// Run the fallback cascade and attach the winning stream.
    pub async fn negotiate(&mut self) -> Result<(), CaptureError> {
        if self.outcome.is_some() {
            return Err(CaptureError::ConfigurationFailed("session already finalized".into()));
        }
        if !self.state().is_idle() {
            return Err(CaptureError::ConfigurationFailed("can only negotiate from idle state".into()));
        }
        self.transition(SessionState::Negotiating);

        let result = {
            let context = StrategyContext {
                config: &self.config,
                capabilities: &self.capabilities,
                cancel: &self.control.cancel,
                subprocess: &self.subprocess,
            };
            run_cascade(&self.strategies, &context, self.context.as_ref()).await
        };

        match result {
            Ok(capture) => {
                self.method = Some(capture.method);
                self.is_system_audio = capture.is_system_audio;
                self.attempts = capture.attempts;
                self.stream = Some(capture.stream);
                self.graph = Some(capture.graph);
                self.transition(SessionState::Attached);
                Ok(())
            }
            Err(e) => {
                if let CaptureError::CaptureExhausted { attempts, .. } = &e {
                    self.attempts = attempts.clone();
                }
                Err(self.fail(e).await)
            }
        }
    }

    /// Start the recorder and, when a level source exists, the level monitor.
    pub async fn start_recording(&mut self, on_levels: Option<LevelCallback>) -> Result<(), CaptureError> {
        if self.state() != SessionState::Attached {
            return Err(CaptureError::ConfigurationFailed("can only record from attached state".into()));
        }
        let Some(graph) = self.graph.as_ref() else {
            return Err(self.fail(CaptureError::NoAudioTrack("no attached stream".into())).await);
        };

        let recordable = graph.recordable();
        let level_source = graph.level_source();

        let recorder = match Recorder::start(recordable, &self.registry, &RecorderOptions::from_config(&self.config)) {
            Ok(recorder) => recorder,
            Err(e) => return Err(self.fail(e).await),
        };
        self.recorder = Some(recorder);

        if let Some(source) = level_source {
            let shared = Arc::clone(&self.shared);
            let delegate = self.delegate.clone();
            let callback: LevelCallback = Arc::new(move |levels: &AudioLevels| {
                shared.lock().levels = levels.clone();
                if let Some(delegate) = &delegate {
                    delegate.on_levels_updated(levels);
                }
                if let Some(on_levels) = &on_levels {
                    on_levels(levels);
                }
            });
            match LevelMonitor::start(source, self.config.level_interval(), callback) {
                Ok(monitor) => self.monitor = Some(monitor),
                Err(e) => log::warn!("level monitoring unavailable: {}", e),
            }
        } else {
            log::info!("degraded signal graph, recording without level monitoring");
        }

        self.recording_started = Some(Instant::now());
        self.transition(SessionState::Recording { duration_secs: 0.0 });
        Ok(())
    }

    /// Record until the configured duration elapses, a finite source runs
    /// out, a stop is requested or the session is cancelled.
    pub async fn run(&mut self) -> Result<CapturePayload, CaptureError> {
        if !self.state().is_recording() {
            return Err(CaptureError::ConfigurationFailed("session is not recording".into()));
        }
        let limit = self.config.duration();
        let stop = self.control.stop.clone();
        let cancel = self.control.cancel.clone();
        let mut ticker = tokio::time::interval(RUN_TICK);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.abort().await;
                    return Err(CaptureError::Cancelled);
                }
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let elapsed = self.elapsed();
                    self.transition(SessionState::Recording { duration_secs: elapsed.as_secs_f64() });
                    if limit.is_some_and(|limit| elapsed >= limit) {
                        log::info!("session {} reached its {:?} limit", self.id, elapsed);
                        break;
                    }
                    if self.stream.as_ref().is_some_and(MediaStream::is_finished) {
                        log::info!("session {} source finished", self.id);
                        break;
                    }
                }
            }
        }
        self.stop().await
    }

    /// Finalize the recording into a validated payload and tear down.
    pub async fn stop(&mut self) -> Result<CapturePayload, CaptureError> {
        if !self.state().is_recording() {
            return Err(CaptureError::ConfigurationFailed("session is not recording".into()));
        }
        self.transition(SessionState::Stopping);

        let stats = self.monitor.as_ref().map(LevelMonitor::statistics);
        let origin = PayloadOrigin {
            method: self.method.clone().unwrap_or_default(),
            is_system_audio: self.is_system_audio,
        };
        let result = match self.recorder.take() {
            Some(mut recorder) => {
                let result = recorder.finish(stats.as_ref(), origin);
                self.teardown.push(TeardownStep::Recorder);
                result
            }
            None => Err(CaptureError::ConfigurationFailed("recorder not running".into())),
        };
        self.shutdown().await;

        match result {
            Ok(payload) => {
                self.finalize(Outcome::Accepted);
                if let Some(delegate) = &self.delegate {
                    delegate.on_payload_ready(&payload);
                }
                Ok(payload)
            }
            Err(e) => {
                log::warn!("session {} rejected: {}", self.id, e);
                self.notify_error(&e);
                self.finalize(Outcome::Rejected);
                Err(e)
            }
        }
    }

    /// Cancel a recording in progress. Negotiation in flight is cancelled
    /// through [`SessionControl::cancel`] instead.
    pub async fn cancel(&mut self) -> bool {
        if !self.state().is_recording() {
            return false;
        }
        self.control.cancel();
        self.abort().await;
        true
    }

    /// Release every resource in reverse acquisition order. Idempotent.
    ///
    /// A capture subprocess still running is given its grace period without
    /// holding up the runtime.
    pub async fn shutdown(&mut self) {
        self.release_media();
        if let Some(mut process) = self.subprocess.take() {
            let result = self.termination.terminate(process.as_mut()).await;
            self.record_termination(process.id(), result);
        }
        self.release_context();
    }

    /// Blocking form of [`shutdown`](Self::shutdown) for teardown outside the
    /// runtime, such as drop.
    pub fn cleanup(&mut self) {
        self.release_media();
        if let Some(mut process) = self.subprocess.take() {
            let result = self.termination.terminate_blocking(process.as_mut());
            self.record_termination(process.id(), result);
        }
        self.release_context();
    }

    fn release_media(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.halt();
            self.teardown.push(TeardownStep::Recorder);
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
            self.teardown.push(TeardownStep::Monitor);
        }
        if let Some(mut graph) = self.graph.take() {
            graph.disconnect();
            self.teardown.push(TeardownStep::Graph);
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            self.teardown.push(TeardownStep::Tracks);
        }
    }

    fn record_termination(&mut self, pid: Option<u32>, result: Result<TerminationOutcome, CaptureError>) {
        match result {
            Ok(outcome) => log::debug!("capture subprocess {:?} terminated: {:?}", pid, outcome),
            Err(e) => log::error!("failed to terminate capture subprocess {:?}: {}", pid, e),
        }
        self.teardown.push(TeardownStep::Subprocess);
    }

    fn release_context(&mut self) {
        if let Some(context) = self.context.take() {
            context.close();
            self.teardown.push(TeardownStep::Context);
        }
    }

    fn elapsed(&self) -> Duration {
        self.recording_started.map(|t| t.elapsed()).unwrap_or_default()
    }

    async fn abort(&mut self) {
        log::info!("session {} cancelled", self.id);
        self.transition(SessionState::Stopping);
        self.shutdown().await;
        self.notify_error(&CaptureError::Cancelled);
        self.finalize(Outcome::Rejected);
    }

    /// Tear down after a failure before recording produced anything.
    async fn fail(&mut self, error: CaptureError) -> CaptureError {
        self.transition(SessionState::Stopping);
        self.shutdown().await;
        self.notify_error(&error);
        self.finalize(Outcome::Rejected);
        error
    }

    fn finalize(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.transition(SessionState::Finalized(outcome));
        self.transition(SessionState::Idle);
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(delegate) = &self.delegate {
            delegate.on_error(error);
        }
    }

    fn transition(&self, next: SessionState) {
        {
            let mut shared = self.shared.lock();
            if !shared.state.can_transition_to(&next) {
                log::warn!("session {}: unexpected transition {:?} -> {:?}", self.id, shared.state, next);
            }
            shared.state = next.clone();
        }
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&next);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("method", &self.method)
            .field("teardown", &self.teardown)
            .finish()
    }
}

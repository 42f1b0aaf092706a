use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::media::stream::MediaStream;
use crate::models::capability::CapabilityRecord;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::processing::analyser::{AnalyserNode, AnalyserOptions};
use crate::processing::gain::GainNode;
use crate::processing::mixdown::Mixdown;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::capture_provider::AudioBufferCallback;

/// Sample rates a processing context accepts.
pub const CONTEXT_SAMPLE_RATES: std::ops::RangeInclusive<u32> = 8000..=384_000;

/// Seconds of output audio the destination holds before dropping the oldest.
const DESTINATION_BUFFER_SECS: usize = 10;

/// The signal-processing context graph nodes are created in.
///
/// Owned by the capture session and closed last during teardown.
#[derive(Debug)]
pub struct ProcessingContext {
    id: String,
    sample_rate: u32,
    closed: AtomicBool,
}

impl ProcessingContext {
    pub fn new(capabilities: &CapabilityRecord, sample_rate: u32) -> Result<Self, CaptureError> {
        if !capabilities.has_signal_processing_context {
            return Err(CaptureError::ProcessingContextUnavailable(
                "environment has no signal processing context".into(),
            ));
        }
        if !CONTEXT_SAMPLE_RATES.contains(&sample_rate) {
            return Err(CaptureError::ProcessingContextUnavailable(format!(
                "unsupported context sample rate: {}",
                sample_rate
            )));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            sample_rate,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Returns `true` only for the call that actually closed the context.
    pub fn close(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        if was_open {
            log::debug!("processing context {} closed", self.id);
        }
        was_open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Source,
    Gain,
    Analyser,
    Destination,
}

/// Records connections while a graph is being wired.
///
/// On failure `abort` disconnects everything made so far, so no node is left
/// half-attached to a live stream.
#[derive(Debug)]
pub(crate) struct GraphBuilder {
    connections: Vec<(NodeKind, NodeKind)>,
    live: Arc<AtomicBool>,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn connect(&mut self, from: NodeKind, to: NodeKind) {
        self.connections.push((from, to));
    }

    pub(crate) fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn abort(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        log::debug!("graph construction aborted, disconnecting {} connections", self.connections.len());
        self.connections.clear();
    }
}

/// The recordable output of a graph: mixed-down samples in the session's
/// output format, waiting for the recorder.
#[derive(Clone)]
pub struct RecordableStream {
    buffer: Arc<Mutex<RingBuffer>>,
    sample_rate: u32,
    channels: u16,
    samples_written: Arc<AtomicU64>,
}

impl RecordableStream {
    fn new(sample_rate: u32, channels: u16) -> Self {
        let capacity = sample_rate as usize * usize::from(channels) * DESTINATION_BUFFER_SECS;
        Self {
            buffer: Arc::new(Mutex::new(RingBuffer::new(capacity))),
            sample_rate,
            channels,
            samples_written: Arc::new(AtomicU64::new(0)),
        }
    }

    fn write(&self, samples: &[f32]) {
        self.buffer.lock().write(samples);
        self.samples_written.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }

    /// Take everything buffered so far.
    pub fn drain(&self) -> Vec<f32> {
        self.buffer.lock().drain()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total samples that ever reached the destination.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RecordableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordableStream")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// Source → gain → analyser, with the gain output also mixed down into a
/// recordable destination.
///
/// In degraded mode (no processing context) the source feeds the destination
/// directly: no gain boost and no level source.
pub struct SignalGraph {
    gain: Option<Arc<GainNode>>,
    analyser: Option<Arc<AnalyserNode>>,
    destination: RecordableStream,
    connections: Vec<(NodeKind, NodeKind)>,
    live: Arc<AtomicBool>,
}

impl SignalGraph {
    /// Wire `stream` into a processing graph and start it.
    ///
    /// A missing or closed context degrades to pass-through instead of failing.
    pub fn attach(
        stream: &mut MediaStream,
        config: &CaptureConfig,
        is_system_audio: bool,
        context: Option<&ProcessingContext>,
    ) -> Result<Self, CaptureError> {
        Self::attach_with(stream, config, is_system_audio, context, AnalyserOptions::default())
    }

    pub fn attach_with(
        stream: &mut MediaStream,
        config: &CaptureConfig,
        is_system_audio: bool,
        context: Option<&ProcessingContext>,
        options: AnalyserOptions,
    ) -> Result<Self, CaptureError> {
        match Self::build_processed(stream, config, is_system_audio, context, options) {
            Err(CaptureError::ProcessingContextUnavailable(reason)) => {
                log::warn!("signal processing unavailable ({}), recording raw stream", reason);
                Self::passthrough(stream, config)
            }
            other => other,
        }
    }

    fn build_processed(
        stream: &mut MediaStream,
        config: &CaptureConfig,
        is_system_audio: bool,
        context: Option<&ProcessingContext>,
        options: AnalyserOptions,
    ) -> Result<Self, CaptureError> {
        let context = context.ok_or_else(|| CaptureError::ProcessingContextUnavailable("no context".into()))?;
        if !context.is_open() {
            return Err(CaptureError::ProcessingContextUnavailable("context closed".into()));
        }

        let mut builder = GraphBuilder::new();

        let initial_gain = config.effective_gain(is_system_audio);
        let gain = Arc::new(GainNode::new(initial_gain));
        builder.connect(NodeKind::Source, NodeKind::Gain);

        let analyser = match AnalyserNode::new(options) {
            Ok(node) => Arc::new(node),
            Err(e) => {
                builder.abort();
                return Err(e);
            }
        };
        builder.connect(NodeKind::Gain, NodeKind::Analyser);

        let destination = RecordableStream::new(config.sample_rate, config.channels);
        builder.connect(NodeKind::Gain, NodeKind::Destination);

        let live = builder.live_flag();
        let mixdown = Mutex::new(Mixdown::new(f64::from(config.sample_rate), config.channels));
        let callback: AudioBufferCallback = {
            let live = Arc::clone(&live);
            let gain = Arc::clone(&gain);
            let analyser = Arc::clone(&analyser);
            let destination = destination.clone();
            Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
                if !live.load(Ordering::Acquire) {
                    return;
                }
                let mut boosted = samples.to_vec();
                gain.process(&mut boosted);
                analyser.push(&boosted, channels);
                destination.write(&mixdown.lock().process(&boosted, sample_rate, channels));
            })
        };

        if let Err(e) = stream.start(callback) {
            builder.abort();
            return Err(e);
        }

        log::info!(
            "signal graph attached: gain {:.2}, {} connections",
            initial_gain,
            builder.connection_count()
        );

        Ok(Self {
            gain: Some(gain),
            analyser: Some(analyser),
            destination,
            connections: std::mem::take(&mut builder.connections),
            live,
        })
    }

    fn passthrough(stream: &mut MediaStream, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let mut builder = GraphBuilder::new();
        let destination = RecordableStream::new(config.sample_rate, config.channels);
        builder.connect(NodeKind::Source, NodeKind::Destination);

        let live = builder.live_flag();
        let mixdown = Mutex::new(Mixdown::new(f64::from(config.sample_rate), config.channels));
        let callback: AudioBufferCallback = {
            let live = Arc::clone(&live);
            let destination = destination.clone();
            Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
                if live.load(Ordering::Acquire) {
                    destination.write(&mixdown.lock().process(samples, sample_rate, channels));
                }
            })
        };

        if let Err(e) = stream.start(callback) {
            builder.abort();
            return Err(e);
        }

        Ok(Self {
            gain: None,
            analyser: None,
            destination,
            connections: std::mem::take(&mut builder.connections),
            live,
        })
    }

    pub fn recordable(&self) -> RecordableStream {
        self.destination.clone()
    }

    /// Analysis stage for level monitoring; `None` in degraded mode.
    pub fn level_source(&self) -> Option<Arc<AnalyserNode>> {
        self.analyser.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.gain.is_none()
    }

    pub fn gain(&self) -> Option<f32> {
        self.gain.as_ref().map(|g| g.gain())
    }

    /// Adjust gain at runtime. Returns the applied (clamped) value.
    pub fn set_gain(&self, gain: f32) -> Option<f32> {
        self.gain.as_ref().map(|g| g.set_gain(gain))
    }

    pub fn connections(&self) -> &[(NodeKind, NodeKind)] {
        &self.connections
    }

    pub fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Disconnect every node. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("signal graph disconnected ({} connections)", self.connections.len());
        }
        self.connections.clear();
    }
}

impl Drop for SignalGraph {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SignalGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGraph")
            .field("degraded", &self.is_degraded())
            .field("gain", &self.gain())
            .field("connections", &self.connections)
            .field("connected", &self.is_connected())
            .finish()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::encoding::{EncoderRegistry, DEFAULT_MIME_PREFERENCES};
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::levels::LevelStatistics;
use crate::models::payload::{CapturePayload, PayloadFormat, PayloadOrigin};
use crate::processing::graph::RecordableStream;
use crate::traits::encoder::{AudioEncoder, EncoderSettings};

/// Payloads below this size carry nothing a transcriber can use.
pub const MIN_PAYLOAD_BYTES: usize = 1024;

/// Session-average volume below which a capture counts as silent.
pub const NEAR_SILENCE_VOLUME: f32 = 0.01;

pub const DEFAULT_TIMESLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderOptions {
    pub mime_preferences: Vec<String>,
    pub timeslice: Duration,
    pub bit_depth: u16,
    pub bits_per_second: u32,
}

impl RecorderOptions {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            mime_preferences: DEFAULT_MIME_PREFERENCES.iter().map(|s| s.to_string()).collect(),
            timeslice: DEFAULT_TIMESLICE,
            bit_depth: config.bit_depth,
            bits_per_second: config.bits_per_second,
        }
    }
}

/// Reject payloads that are empty or, when levels were sampled, near-silent.
pub fn validate_payload(bytes: usize, stats: Option<&LevelStatistics>) -> Result<(), CaptureError> {
    if bytes < MIN_PAYLOAD_BYTES {
        return Err(CaptureError::EmptyCapture { bytes });
    }
    if let Some(average_volume) = stats.and_then(LevelStatistics::average_volume) {
        if average_volume < NEAR_SILENCE_VOLUME {
            return Err(CaptureError::SilentCapture { average_volume });
        }
    }
    Ok(())
}

/// Accumulates encoded chunks from a recordable stream.
///
/// A pump task drains the stream every timeslice; `finish` flushes what is
/// left, assembles the payload and validates it.
pub struct Recorder {
    recordable: RecordableStream,
    settings: EncoderSettings,
    mime_type: String,
    encoder: Arc<Mutex<Box<dyn AudioEncoder>>>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    samples_encoded: Arc<AtomicU64>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl Recorder {
    pub fn start(
        recordable: RecordableStream,
        registry: &EncoderRegistry,
        options: &RecorderOptions,
    ) -> Result<Self, CaptureError> {
        let mime_type = registry
            .select(&options.mime_preferences)
            .ok_or(CaptureError::NoSupportedEncoding)?
            .to_string();

        let settings = EncoderSettings {
            sample_rate: recordable.sample_rate(),
            channels: recordable.channels(),
            bit_depth: options.bit_depth,
            bits_per_second: options.bits_per_second,
        };
        let encoder = registry
            .create(&mime_type, &settings)
            .ok_or(CaptureError::NoSupportedEncoding)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::ConfigurationFailed(format!("recorder needs a tokio runtime: {}", e)))?;

        let encoder = Arc::new(Mutex::new(encoder));
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let samples_encoded = Arc::new(AtomicU64::new(0));
        let token = CancellationToken::new();
        let timeslice = options.timeslice.max(Duration::from_millis(1));

        let task = {
            let recordable = recordable.clone();
            let encoder = Arc::clone(&encoder);
            let chunks = Arc::clone(&chunks);
            let samples_encoded = Arc::clone(&samples_encoded);
            let token = token.clone();
            runtime.spawn(async move {
                let mut ticker = tokio::time::interval(timeslice);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => pump(&recordable, &encoder, &chunks, &samples_encoded),
                    }
                }
            })
        };

        log::info!("recorder started: {} ({} Hz, {} ch)", mime_type, settings.sample_rate, settings.channels);
        Ok(Self {
            recordable,
            settings,
            mime_type,
            encoder,
            chunks,
            samples_encoded,
            token,
            task: Some(task),
            finished: false,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_recording(&self) -> bool {
        self.task.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Stop the pump without producing a payload. Idempotent.
    pub fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            self.token.cancel();
            task.abort();
            log::debug!("recorder halted");
        }
    }

    /// Flush, assemble and validate the payload.
    ///
    /// `stats` are the level statistics collected over the session, if any.
    pub fn finish(
        &mut self,
        stats: Option<&LevelStatistics>,
        origin: PayloadOrigin,
    ) -> Result<CapturePayload, CaptureError> {
        if self.finished {
            return Err(CaptureError::ConfigurationFailed("recorder already finished".into()));
        }
        self.halt();
        self.finished = true;

        pump(&self.recordable, &self.encoder, &self.chunks, &self.samples_encoded);

        let chunks = std::mem::take(&mut *self.chunks.lock());
        let bytes = self.encoder.lock().finish(chunks)?;
        validate_payload(bytes.len(), stats)?;

        let frames = self.samples_encoded.load(Ordering::Relaxed) as f64 / f64::from(self.settings.channels.max(1));
        let format = PayloadFormat {
            mime_type: self.mime_type.clone(),
            sample_rate: self.settings.sample_rate,
            channels: self.settings.channels,
            bit_depth: self.settings.bit_depth,
            duration_secs: frames / f64::from(self.settings.sample_rate.max(1)),
        };
        let payload = CapturePayload::new(bytes, format, origin);
        log::info!(
            "recording finalized: {} bytes, {:.2}s, request {}",
            payload.len(),
            payload.metadata.duration_secs,
            payload.request_id()
        );
        Ok(payload)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.halt();
    }
}

fn pump(
    recordable: &RecordableStream,
    encoder: &Mutex<Box<dyn AudioEncoder>>,
    chunks: &Mutex<Vec<Vec<u8>>>,
    samples_encoded: &AtomicU64,
) {
    let samples = recordable.drain();
    if samples.is_empty() {
        return;
    }
    match encoder.lock().encode(&samples) {
        Ok(chunk) => {
            samples_encoded.fetch_add(samples.len() as u64, Ordering::Relaxed);
            chunks.lock().push(chunk);
        }
        Err(e) => log::error!("failed to encode audio chunk: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::stream::MediaStream;
    use crate::models::capability::{CapabilityRecord, PlatformFamily};
    use crate::processing::graph::{ProcessingContext, SignalGraph};
    use crate::test_support::ToneProvider;

    fn stats(volume: f32) -> LevelStatistics {
        LevelStatistics {
            ticks: 4,
            volume_sum: f64::from(volume) * 4.0,
            peak_max: volume,
        }
    }

    #[test]
    fn under_one_kilobyte_is_empty() {
        for bytes in [0, 44, 1023] {
            assert_eq!(validate_payload(bytes, None), Err(CaptureError::EmptyCapture { bytes }));
            assert!(matches!(
                validate_payload(bytes, Some(&stats(0.5))),
                Err(CaptureError::EmptyCapture { .. })
            ));
        }
        assert!(validate_payload(1024, None).is_ok());
    }

    #[test]
    fn quiet_session_is_silent() {
        assert!(matches!(
            validate_payload(50_000, Some(&stats(0.001))),
            Err(CaptureError::SilentCapture { .. })
        ));
        assert!(validate_payload(50_000, Some(&stats(0.2))).is_ok());
        // no ticks means no statistics to judge by
        assert!(validate_payload(50_000, Some(&LevelStatistics::default())).is_ok());
    }

    fn attached(amplitude: f32, config: &CaptureConfig) -> (MediaStream, SignalGraph) {
        let caps = CapabilityRecord {
            has_signal_processing_context: true,
            ..CapabilityRecord::none(PlatformFamily::Linux)
        };
        let ctx = ProcessingContext::new(&caps, config.sample_rate).unwrap();
        let mut stream = MediaStream::from_provider(Box::new(ToneProvider::new(amplitude)));
        let graph = SignalGraph::attach(&mut stream, config, false, Some(&ctx)).unwrap();
        (stream, graph)
    }

    #[tokio::test]
    async fn no_supported_encoding_is_fatal() {
        let config = CaptureConfig::default();
        let (_stream, graph) = attached(0.2, &config);
        let result = Recorder::start(graph.recordable(), &EncoderRegistry::empty(), &RecorderOptions::from_config(&config));
        assert!(matches!(result, Err(CaptureError::NoSupportedEncoding)));
    }

    #[tokio::test]
    async fn records_wav_payload() {
        let config = CaptureConfig::default();
        let (mut stream, graph) = attached(0.2, &config);
        let options = RecorderOptions {
            timeslice: Duration::from_millis(20),
            ..RecorderOptions::from_config(&config)
        };
        let mut recorder = Recorder::start(graph.recordable(), &EncoderRegistry::default(), &options).unwrap();
        assert_eq!(recorder.mime_type(), "audio/wav");

        tokio::time::sleep(Duration::from_millis(150)).await;
        stream.stop();
        let payload = recorder
            .finish(
                Some(&stats(0.3)),
                PayloadOrigin {
                    method: "microphone".into(),
                    is_system_audio: false,
                },
            )
            .unwrap();

        assert!(payload.len() > MIN_PAYLOAD_BYTES);
        assert_eq!(&payload.bytes[0..4], b"RIFF");
        assert_eq!(payload.metadata.method, "microphone");
        assert!(payload.metadata.duration_secs > 0.0);
        assert!(!recorder.is_recording());
        assert!(recorder.finish(None, PayloadOrigin::default()).is_err());
    }

    #[tokio::test]
    async fn nothing_recorded_is_empty_capture() {
        let config = CaptureConfig::default();
        let (mut stream, graph) = attached(0.2, &config);
        stream.stop();
        graph.recordable().drain();

        let mut recorder =
            Recorder::start(graph.recordable(), &EncoderRegistry::default(), &RecorderOptions::from_config(&config))
                .unwrap();
        let err = recorder.finish(None, PayloadOrigin::default()).unwrap_err();
        assert_eq!(err, CaptureError::EmptyCapture { bytes: 44 });
    }
}

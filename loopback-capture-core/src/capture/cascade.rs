use std::sync::Arc;

use crate::capture::remediation::exhausted;
use crate::media::stream::MediaStream;
use crate::models::attempt::{AttemptLog, CaptureAttempt};
use crate::models::error::CaptureError;
use crate::processing::graph::{ProcessingContext, RecordableStream, SignalGraph};
use crate::traits::capture_strategy::{CaptureStrategy, StrategyContext};

/// A negotiated capture: the raw stream wired into its signal graph.
///
/// The caller owns every resource in here and must route it through the
/// recorder and session cleanup.
#[derive(Debug)]
pub struct CaptureResult {
    pub stream: MediaStream,
    pub graph: SignalGraph,
    pub recordable: RecordableStream,
    pub method: String,
    pub is_system_audio: bool,
    pub automatic: bool,
    pub attempts: Vec<CaptureAttempt>,
}

/// Fold over `strategies` in order; the first stream with live audio that
/// attaches to a signal graph wins.
///
/// Failures (including streams without usable audio and graph attachment
/// errors) are logged and the cascade moves on. Cancellation aborts the
/// in-flight strategy and ends the cascade immediately.
pub async fn run_cascade(
    strategies: &[Arc<dyn CaptureStrategy>],
    context: &StrategyContext<'_>,
    processing: Option<&ProcessingContext>,
) -> Result<CaptureResult, CaptureError> {
    let mut log = AttemptLog::new();

    for strategy in strategies {
        if context.cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }
        let name = strategy.name().to_string();
        let automatic = strategy.automatic();
        log::info!("trying capture strategy {} (automatic: {})", name, automatic);

        let attempt = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => {
                log::info!("negotiation cancelled during {}", name);
                return Err(CaptureError::Cancelled);
            }
            result = strategy.attempt(context, &mut log) => result,
        };

        let mut outcome = match attempt {
            Ok(outcome) => outcome,
            Err(CaptureError::Cancelled) => return Err(CaptureError::Cancelled),
            Err(e) => {
                log.record_failure(name, automatic, e);
                continue;
            }
        };

        if !outcome.stream.has_usable_audio() {
            outcome.stream.stop();
            log.record_failure(
                name,
                automatic,
                CaptureError::NoAudioTrack("stream has no live audio track".into()),
            );
            continue;
        }

        let is_system_audio = strategy.is_system_audio();
        let graph = match SignalGraph::attach(&mut outcome.stream, context.config, is_system_audio, processing) {
            Ok(graph) => graph,
            Err(e) => {
                outcome.stream.stop();
                log.record_failure(name, automatic, e);
                continue;
            }
        };

        log.record_success(name, automatic);
        log::info!("capture negotiated via {} (system audio: {})", outcome.method, is_system_audio);
        return Ok(CaptureResult {
            recordable: graph.recordable(),
            graph,
            stream: outcome.stream,
            method: outcome.method,
            is_system_audio,
            automatic,
            attempts: log.into_entries(),
        });
    }

    Err(exhausted(log.into_entries(), context.capabilities.platform, context.config))
}

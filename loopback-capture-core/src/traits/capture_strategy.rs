use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::media::stream::MediaStream;
use crate::models::attempt::AttemptLog;
use crate::models::capability::CapabilityRecord;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::process::SubprocessSlot;

/// Everything a strategy may consult during one negotiation.
pub struct StrategyContext<'a> {
    pub config: &'a CaptureConfig,
    pub capabilities: &'a CapabilityRecord,
    pub cancel: &'a CancellationToken,
    /// Where a strategy driving an external recorder publishes its process.
    pub subprocess: &'a SubprocessSlot,
}

/// A stream opened by a strategy, plus the method label reported to the caller.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub stream: MediaStream,
    pub method: String,
}

impl StrategyOutcome {
    pub fn new(stream: MediaStream, method: impl Into<String>) -> Self {
        Self {
            stream,
            method: method.into(),
        }
    }
}

/// One entry in the fallback cascade.
///
/// A strategy that tries several sub-sources records each failed one in the
/// attempt log itself; its own overall failure is recorded by the cascade.
#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Non-interactive strategies never prompt the user.
    fn automatic(&self) -> bool;

    /// Whether a stream from this strategy carries system output audio.
    fn is_system_audio(&self) -> bool;

    async fn attempt(
        &self,
        context: &StrategyContext<'_>,
        log: &mut AttemptLog,
    ) -> Result<StrategyOutcome, CaptureError>;
}

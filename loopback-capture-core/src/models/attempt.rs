use super::error::CaptureError;

/// One strategy attempt made during a single negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureAttempt {
    pub strategy: String,
    pub automatic: bool,
    pub error: Option<CaptureError>,
}

impl CaptureAttempt {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Ordered attempt log for one negotiation. Discarded once negotiation ends.
#[derive(Debug, Default)]
pub struct AttemptLog {
    entries: Vec<CaptureAttempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, strategy: impl Into<String>, automatic: bool, error: CaptureError) {
        let strategy = strategy.into();
        log::warn!("capture strategy {} failed: {}", strategy, error);
        self.entries.push(CaptureAttempt {
            strategy,
            automatic,
            error: Some(error),
        });
    }

    pub fn record_success(&mut self, strategy: impl Into<String>, automatic: bool) {
        let strategy = strategy.into();
        log::info!("capture strategy {} succeeded", strategy);
        self.entries.push(CaptureAttempt {
            strategy,
            automatic,
            error: None,
        });
    }

    pub fn entries(&self) -> &[CaptureAttempt] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaptureAttempt> {
        self.entries.iter().filter(|a| a.failed())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<CaptureAttempt> {
        self.entries
    }
}

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::error::CaptureError;
use crate::models::levels::{AudioLevels, LevelStatistics};
use crate::processing::analyser::AnalyserNode;

/// Receives every level reading.
pub type LevelCallback = Arc<dyn Fn(&AudioLevels) + Send + Sync + 'static>;

/// Volume (RMS), peak and average of byte-scaled frequency data, normalized to `[0, 1]`.
pub fn compute_levels(data: &[u8]) -> AudioLevels {
    if data.is_empty() {
        return AudioLevels::default();
    }
    let n = data.len() as f64;
    let sum: f64 = data.iter().map(|&b| f64::from(b)).sum();
    let sum_sq: f64 = data.iter().map(|&b| f64::from(b) * f64::from(b)).sum();
    let max = data.iter().copied().max().unwrap_or(0);

    AudioLevels {
        volume: ((sum_sq / n).sqrt() / 255.0) as f32,
        peak: f32::from(max) / 255.0,
        average: (sum / n / 255.0) as f32,
        spectrum: Some(data.to_vec()),
    }
}

/// Subscription handle for periodic level sampling.
///
/// The sampling task runs until [`stop`](Self::stop) is called or the handle
/// is dropped; `stop` is the only way to release it and is idempotent.
pub struct LevelMonitor {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<Mutex<LevelStatistics>>,
    latest: Arc<Mutex<AudioLevels>>,
}

impl LevelMonitor {
    /// Spawn the sampling task on the current tokio runtime.
    pub fn start(source: Arc<AnalyserNode>, interval: Duration, callback: LevelCallback) -> Result<Self, CaptureError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::ConfigurationFailed(format!("level monitor needs a tokio runtime: {}", e)))?;

        let interval = interval.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let stats = Arc::new(Mutex::new(LevelStatistics::default()));
        let latest = Arc::new(Mutex::new(AudioLevels::default()));

        let task = {
            let token = token.clone();
            let stats = Arc::clone(&stats);
            let latest = Arc::clone(&latest);
            runtime.spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let levels = compute_levels(&source.byte_frequency_data());
                            stats.lock().record(&levels);
                            *latest.lock() = levels.clone();
                            callback(&levels);
                        }
                    }
                }
                log::debug!("level monitor stopped");
            })
        };

        log::debug!("level monitor started, interval {:?}", interval);
        Ok(Self {
            token,
            task: Some(task),
            stats,
            latest,
        })
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.token.cancel();
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn statistics(&self) -> LevelStatistics {
        *self.stats.lock()
    }

    pub fn latest(&self) -> AudioLevels {
        self.latest.lock().clone()
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

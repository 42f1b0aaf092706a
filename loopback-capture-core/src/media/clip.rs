use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::device::{DeviceDescriptor, DeviceKind};
use crate::models::error::CaptureError;
use crate::traits::capture_provider::{AudioBufferCallback, CaptureProvider};

/// Replay chunk length in seconds.
const CHUNK_SECONDS: f64 = 0.1;

/// Replays an already-recorded clip as a finite capture source.
///
/// Used for audio produced by the native capture tool: the clip is fed
/// through the signal graph in 100 ms chunks, one chunk per `pacing`
/// interval, and reports finished once every sample has been delivered.
pub struct ClipProvider {
    label: String,
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    pacing: Duration,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    replay_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ClipProvider {
    pub fn new(label: impl Into<String>, samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            label: label.into(),
            samples: Arc::new(samples),
            sample_rate,
            channels: channels.max(1),
            pacing: Duration::from_millis(10),
            running: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            replay_handle: Mutex::new(None),
        }
    }

    /// Delay between chunks. `Duration::from_millis(100)` replays in real time.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.channels) / f64::from(self.sample_rate.max(1))
    }
}

impl CaptureProvider for ClipProvider {
    fn is_available(&self) -> bool {
        !self.samples.is_empty()
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::ConfigurationFailed("clip replay already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let finished = Arc::clone(&self.finished);
        let samples = Arc::clone(&self.samples);
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let pacing = self.pacing;
        let chunk_len = ((f64::from(sample_rate) * CHUNK_SECONDS) as usize).max(1) * usize::from(channels);

        let handle = thread::Builder::new()
            .name("clip-replay".into())
            .spawn(move || {
                for chunk in samples.chunks(chunk_len) {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    callback(chunk, f64::from(sample_rate), channels);
                    thread::sleep(pacing);
                }
                finished.store(true, Ordering::SeqCst);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| CaptureError::SourceUnavailable(format!("failed to spawn replay thread: {}", e)))?;

        *self.replay_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.replay_handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> DeviceDescriptor {
        DeviceDescriptor::new("clip", self.label.clone(), DeviceKind::LoopbackHint)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn replays_every_sample_then_finishes() {
        let samples: Vec<f32> = (0..4800).map(|i| i as f32 / 4800.0).collect();
        let mut clip = ClipProvider::new("clip", samples, 8000, 2).with_pacing(Duration::from_millis(1));
        assert!((clip.duration_secs() - 0.3).abs() < 1e-9);

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        clip.start(Arc::new(move |chunk: &[f32], rate: f64, channels: u16| {
            assert_eq!(rate, 8000.0);
            assert_eq!(channels, 2);
            counter.fetch_add(chunk.len(), Ordering::SeqCst);
        }))
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !clip.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(clip.is_finished());
        assert_eq!(delivered.load(Ordering::SeqCst), 4800);
        clip.stop().unwrap();
    }

    #[test]
    fn stop_interrupts_replay() {
        let mut clip =
            ClipProvider::new("clip", vec![0.0; 48000 * 10], 48000, 1).with_pacing(Duration::from_millis(50));
        clip.start(Arc::new(|_: &[f32], _: f64, _: u16| {})).unwrap();
        clip.stop().unwrap();
        assert!(!clip.is_finished());
    }
}

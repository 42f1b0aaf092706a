/// Signal levels computed from one analysis read, all normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioLevels {
    pub volume: f32,
    pub peak: f32,
    pub average: f32,
    pub spectrum: Option<Vec<u8>>,
}

/// Running statistics over a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelStatistics {
    pub ticks: u64,
    pub volume_sum: f64,
    pub peak_max: f32,
}

impl LevelStatistics {
    pub fn record(&mut self, levels: &AudioLevels) {
        self.ticks += 1;
        self.volume_sum += f64::from(levels.volume);
        self.peak_max = self.peak_max.max(levels.peak);
    }

    /// Mean volume over all ticks, or `None` if nothing was sampled.
    pub fn average_volume(&self) -> Option<f32> {
        if self.ticks == 0 {
            return None;
        }
        Some((self.volume_sum / self.ticks as f64) as f32)
    }
}

use std::collections::VecDeque;

/// Bounded sample history shared by the analyser window and the graph
/// destination. Writing past capacity evicts the oldest samples.
#[derive(Debug)]
pub struct RingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn write(&mut self, samples: &[f32]) {
        let tail = &samples[samples.len().saturating_sub(self.capacity)..];
        let evict = (self.samples.len() + tail.len()).saturating_sub(self.capacity);
        self.samples.drain(..evict);
        self.samples.extend(tail);
    }

    /// The newest `count` samples, oldest first, left in place.
    pub fn peek_latest(&self, count: usize) -> Vec<f32> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip).copied().collect()
    }

    pub fn drain(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Bounded rolling window of request latencies

use std::collections::VecDeque;

use serde::Serialize;

/// Aggregate view over the current window
///
/// All values are zero for an empty window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub samples: usize,
}

/// FIFO ring of the most recent latency samples, in milliseconds
///
/// Once `capacity` samples are held, each push drops the oldest one.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest sample still in the window
    #[cfg(test)]
    pub fn oldest(&self) -> Option<f64> {
        self.samples.front().copied()
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }

        let (sum, min, max) = self.samples.iter().fold(
            (0.0_f64, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), &v| (sum + v, min.min(v), max.max(v)),
        );

        LatencyStats {
            avg_ms: sum / self.samples.len() as f64,
            min_ms: min,
            max_ms: max,
            samples: self.samples.len(),
        }
    }
}

//! Moving-average smoothing for raw sensor samples.

use crate::types::Triplet;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 10;

/// Bounded FIFO window that reports the mean of what it holds.
///
/// Until the window fills, the mean is taken over the samples seen so far.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window: usize,
    values: VecDeque<f32>,
}

impl MovingAverageFilter {
    /// `window` is clamped to at least one sample
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Append a sample, evicting the oldest once the window is full
    pub fn push(&mut self, value: f32) {
        self.values.push_back(value);
        while self.values.len() > self.window {
            self.values.pop_front();
        }
    }

    /// Mean of the held samples, 0.0 when empty
    pub fn current(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for MovingAverageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// One filter per axis
#[derive(Debug, Clone)]
pub struct TripletFilter {
    x: MovingAverageFilter,
    y: MovingAverageFilter,
    z: MovingAverageFilter,
}

impl TripletFilter {
    pub fn new(window: usize) -> Self {
        Self {
            x: MovingAverageFilter::new(window),
            y: MovingAverageFilter::new(window),
            z: MovingAverageFilter::new(window),
        }
    }

    /// Push a sample and return the filtered triplet
    pub fn apply(&mut self, sample: Triplet) -> Triplet {
        self.x.push(sample.x);
        self.y.push(sample.y);
        self.z.push(sample.z);
        self.current()
    }

    pub fn current(&self) -> Triplet {
        Triplet::new(self.x.current(), self.y.current(), self.z.current())
    }
}

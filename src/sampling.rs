//! Sensor-side data types and the moving-average filter applied before
//! readings enter the shared message queue.

use std::collections::VecDeque;

/// Queue tag used for smoothed sensor readings.
pub const READING_TAG: i64 = 1;

/// One smoothed sample as it travels through the message queue. Fixed
/// `#[repr(C)]` layout: every process sharing the queue sees the same bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub sequence: u32,
    pub millivolts: i32,
}

static_assertions::assert_eq_size!(SensorReading, [u8; 8]);

/// Sliding-window mean over the last `window` raw readings. Window width
/// comes from the `samples_moving_average_filter` configuration field.
pub struct MovingAverage {
    window: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    /// Feeds one raw reading and returns the current windowed mean.
    pub fn push(&mut self, value: f64) -> f64 {
        self.samples.push_back(value);
        self.sum += value;
        if self.samples.len() > self.window {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.sum / self.samples.len() as f64
    }

    /// Drops accumulated history, e.g. after the window width is reloaded.
    pub fn reset(&mut self, window: usize) {
        self.window = window.max(1);
        self.samples.clear();
        self.sum = 0.0;
    }
}

/// Windowed averaging of raw CO2 readings
use crate::models::{Reading, SmoothedPoint};

/// Bins every `N` raw readings into one smoothed point.
///
/// The mean is accumulated incrementally (`co2 / N` per reading), so memory
/// stays constant whatever the window size. The running sum is zeroed at
/// every window boundary, so float drift never carries across windows.
#[derive(Debug, Clone)]
pub struct SampleAggregator {
    window: u32,
    count: u32,
    running_sum: f32,
}

impl SampleAggregator {
    pub fn new(window: u32) -> Self {
        SampleAggregator {
            window: window.max(1),
            count: 0,
            running_sum: 0.0,
        }
    }

    /// Feed one reading; returns a point when this reading closes a window.
    pub fn ingest(&mut self, reading: &Reading) -> Option<SmoothedPoint> {
        self.running_sum += reading.co2 as f32 / self.window as f32;
        self.count = (self.count + 1) % self.window;

        if self.count != 0 {
            return None;
        }

        let point = SmoothedPoint {
            timestamp: reading.timestamp,
            co2_avg: self.running_sum,
        };
        self.running_sum = 0.0;
        Some(point)
    }

    /// Readings collected so far in the current window
    #[cfg(test)]
    pub fn pending(&self) -> u32 {
        self.count
    }
}

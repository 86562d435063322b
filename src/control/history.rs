use std::collections::VecDeque;
use time::OffsetDateTime;

use crate::models::SmoothedPoint;

/// Fixed-capacity FIFO of smoothed points feeding the chart.
///
/// Always holds exactly `capacity` points: it is seeded with placeholders
/// (value 0 at the start time) and every push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    points: VecDeque<SmoothedPoint>,
}

impl RollingHistory {
    pub fn new(capacity: usize, started_at: OffsetDateTime) -> Self {
        let capacity = capacity.max(1);
        let placeholder = SmoothedPoint {
            timestamp: started_at,
            co2_avg: 0.0,
        };
        RollingHistory {
            points: std::iter::repeat(placeholder).take(capacity).collect(),
        }
    }

    pub fn push(&mut self, point: SmoothedPoint) {
        self.points.pop_front();
        self.points.push_back(point);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Values oldest first
    pub fn values(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.co2_avg).collect()
    }

    /// Timestamps oldest first
    pub fn timestamps(&self) -> Vec<OffsetDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn latest(&self) -> Option<&SmoothedPoint> {
        self.points.back()
    }
}

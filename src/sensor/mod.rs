pub mod line_feed;
pub mod simulated;

use thiserror::Error;

use crate::models::SensorSample;

pub use line_feed::LineFeedSensor;
pub use simulated::SimulatedSensor;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no sample available")]
    NotReady,
    #[error("sensor feed closed")]
    Closed,
    #[error("could not open sensor feed: {0}")]
    Open(#[from] std::io::Error),
}

/// A polled CO2/temperature/humidity source.
///
/// `data_ready` never blocks; `read` is only meaningful after it returned true.
pub trait SensorSource {
    fn data_ready(&mut self) -> bool;

    fn read(&mut self) -> Result<SensorSample, SensorError>;

    /// True once the source can never deliver another sample.
    fn is_closed(&self) -> bool {
        false
    }
}

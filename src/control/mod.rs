pub mod actuation;
pub mod aggregator;
pub mod cadence;
pub mod control_loop;
pub mod history;

pub use actuation::{ActuationController, ActuatorSet};
pub use aggregator::SampleAggregator;
pub use cadence::Decimator;
pub use control_loop::ControlLoop;
pub use history::RollingHistory;

pub mod chart;
pub mod sink;

pub use chart::ChartRenderer;
pub use sink::{DisplayError, DisplaySink, PbmDisplay};

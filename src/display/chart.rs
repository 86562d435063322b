//! Line chart of the smoothed CO2 history.
//!
//! Values and timestamps are mapped onto the plot rectangle by two
//! independent linear interpolations. The y axis is inverted so higher
//! concentrations plot higher. A flat series (zero range) maps to the
//! middle of the axis instead of dividing by zero.

use embedded_graphics::prelude::{Point, Size};

use crate::control::RollingHistory;
use crate::display::sink::{DisplayError, DisplaySink, BACKGROUND, FOREGROUND};
use crate::models::Reading;
use crate::utils::{epoch_seconds, format_clock};

/// Plot rectangle placement inside the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartLayout {
    /// Room for the max/min labels
    pub inset_left: i32,
    pub inset_top: i32,
    pub inset_bottom: i32,
    /// Side panel with the latest value and clock time
    pub panel_width: i32,
    /// Edge of the square drawn at each point
    pub marker: u32,
}

impl Default for ChartLayout {
    fn default() -> Self {
        ChartLayout {
            inset_left: 32,
            inset_top: 8,
            inset_bottom: 8,
            panel_width: 62,
            marker: 3,
        }
    }
}

/// Pixel rectangle the series is drawn into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotArea {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl ChartLayout {
    pub fn plot_area(&self, size: Size) -> PlotArea {
        let width = size.width as i32 - self.inset_left - self.panel_width;
        let height = size.height as i32 - self.inset_top - self.inset_bottom;
        PlotArea {
            left: self.inset_left,
            top: self.inset_top,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Position of `value` within `[min, min + range]`, 0.5 when the range is empty
pub fn normalize(value: f64, min: f64, range: f64) -> f64 {
    if range == 0.0 {
        0.5
    } else {
        (value - min) / range
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Map every history point to pixel coordinates inside `area`
///
/// The extremes land on the outline's own pixels, never past it.
pub fn map_points(history: &RollingHistory, area: &PlotArea) -> Vec<Point> {
    let values: Vec<f64> = history.values().iter().map(|v| *v as f64).collect();
    let times: Vec<f64> = history.timestamps().iter().map(epoch_seconds).collect();

    let Some((min_val, max_val)) = min_max(values.iter().copied()) else {
        return Vec::new();
    };
    let Some((min_time, max_time)) = min_max(times.iter().copied()) else {
        return Vec::new();
    };
    let range_val = max_val - min_val;
    let range_time = max_time - min_time;
    let span_x = (area.width - 1) as f64;
    let span_y = (area.height - 1) as f64;

    values
        .iter()
        .zip(times.iter())
        .map(|(&v, &t)| {
            let y = area.top as f64 + (1.0 - normalize(v, min_val, range_val)) * span_y;
            let x = area.left as f64 + normalize(t, min_time, range_time) * span_x;
            Point::new(x.round() as i32, y.round() as i32)
        })
        .collect()
}

/// Draws the history chart onto a display sink.
///
/// Stateless: the same history and latest reading always produce the same
/// frame. The side panel shows the latest raw reading; before the first
/// reading it falls back to the newest history point.
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    layout: ChartLayout,
}

impl ChartRenderer {
    pub async fn render(
        &self,
        history: &RollingHistory,
        latest: Option<&Reading>,
        target: &mut dyn DisplaySink,
    ) -> Result<(), DisplayError> {
        let size = target.size();
        let area = self.layout.plot_area(size);

        target.fill(BACKGROUND);
        target.rect(
            area.left,
            area.top,
            area.width as u32,
            area.height as u32,
            FOREGROUND,
        );

        let points = map_points(history, &area);
        for pair in points.windows(2) {
            target.line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, FOREGROUND);
        }
        let half = (self.layout.marker / 2) as i32;
        for p in &points {
            target.fill_rect(
                p.x - half,
                p.y - half,
                self.layout.marker,
                self.layout.marker,
                FOREGROUND,
            );
        }

        // Max label on the top row, min label on the bottom row
        let values = history.values();
        if let Some((min_val, max_val)) = min_max(values.iter().map(|v| *v as f64)) {
            let label_y = |row: i32| (row - 5).max(0);
            target.text(
                &format!("{:>4}", max_val.round() as i64),
                2,
                label_y(area.top),
                FOREGROUND,
            );
            target.text(
                &format!("{:>4}", min_val.round() as i64),
                2,
                label_y(area.top + area.height),
                FOREGROUND,
            );
        }

        let panel = match latest {
            Some(reading) => Some((reading.co2.to_string(), reading.timestamp)),
            None => history
                .latest()
                .map(|p| (format!("{:.0}", p.co2_avg), p.timestamp)),
        };
        if let Some((value, at)) = panel {
            let panel_x = size.width as i32 - self.layout.panel_width + 6;
            target.text("CO2", panel_x, 10, FOREGROUND);
            target.text(&value, panel_x, 28, FOREGROUND);
            target.text("ppm", panel_x, 40, FOREGROUND);
            target.text(&format_clock(&at), panel_x, 64, FOREGROUND);
        }

        target.present().await
    }
}

/// The poll-process-act cycle driving everything else
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;

use crate::config::{Cadence, Thresholds};
use crate::control::{
    ActuationController, ActuatorSet, Decimator, RollingHistory, SampleAggregator,
};
use crate::display::{ChartRenderer, DisplaySink};
use crate::models::{ActuatorCommand, Reading, SmoothedPoint};
use crate::network::TelemetrySink;
use crate::sensor::{SensorError, SensorSource};
use crate::storage::CsvLog;
use crate::utils::{format_datetime, now_local};

/// What one tick did; mostly of interest to tests and debug logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub reading: Option<Reading>,
    pub smoothed: Option<SmoothedPoint>,
    pub rendered: bool,
    pub checked: bool,
    pub commands: Vec<ActuatorCommand>,
}

/// All process-lifetime loop state: the aggregation window, the chart
/// history and the two decimation counters.
///
/// Aggregation (`N`), chart refresh (`M` smoothed points) and actuation
/// (`P` readings) run at independent rates and are never assumed to line up.
/// Actuation sees raw readings; the chart plots smoothed values and shows
/// the latest raw reading beside them.
pub struct ControlLoop {
    sensor: Box<dyn SensorSource>,
    aggregator: SampleAggregator,
    history: RollingHistory,
    refresh: Decimator,
    automation: Decimator,
    controller: ActuationController,
    actuators: ActuatorSet,
    renderer: ChartRenderer,
    display: Box<dyn DisplaySink>,
    csv_log: Option<CsvLog>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    last_reading: Option<Reading>,
}

impl ControlLoop {
    pub fn new(
        cadence: Cadence,
        thresholds: Thresholds,
        sensor: Box<dyn SensorSource>,
        display: Box<dyn DisplaySink>,
        started_at: OffsetDateTime,
    ) -> Self {
        ControlLoop {
            sensor,
            aggregator: SampleAggregator::new(cadence.samples_per_bin),
            history: RollingHistory::new(cadence.history_len, started_at),
            refresh: Decimator::new(cadence.bins_per_refresh),
            automation: Decimator::new(cadence.polls_per_check),
            controller: ActuationController::new(thresholds),
            actuators: ActuatorSet::default(),
            renderer: ChartRenderer::default(),
            display,
            csv_log: None,
            telemetry: None,
            last_reading: None,
        }
    }

    pub fn with_csv_log(mut self, csv_log: CsvLog) -> Self {
        self.csv_log = Some(csv_log);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_actuators(mut self, actuators: ActuatorSet) -> Self {
        self.actuators = actuators;
        self
    }

    #[cfg(test)]
    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    #[cfg(test)]
    pub fn controller(&self) -> &ActuationController {
        &self.controller
    }

    /// Mirror the devices' relay state and draw the (placeholder) chart once
    pub async fn start(&mut self) {
        self.controller.sync_from_devices(&mut self.actuators).await;
        self.redraw().await;
    }

    /// One poll: skip if the sensor has nothing, otherwise log, aggregate,
    /// maybe redraw and maybe actuate, in that order.
    ///
    /// Only a closed sensor feed is returned as an error.
    pub async fn tick(&mut self, now: OffsetDateTime) -> Result<TickOutcome, SensorError> {
        let mut outcome = TickOutcome::default();

        if !self.sensor.data_ready() {
            if self.sensor.is_closed() {
                return Err(SensorError::Closed);
            }
            debug!("Sensor not ready");
            return Ok(outcome);
        }

        let sample = match self.sensor.read() {
            Ok(sample) => sample,
            Err(SensorError::Closed) => return Err(SensorError::Closed),
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                return Ok(outcome);
            }
        };
        let reading = Reading::new(now, sample);
        outcome.reading = Some(reading);
        self.last_reading = Some(reading);

        self.record(&reading).await;

        if let Some(point) = self.aggregator.ingest(&reading) {
            debug!("Smoothed CO2: {:.1} ppm", point.co2_avg);
            self.history.push(point);
            outcome.smoothed = Some(point);
            if self.refresh.tick() {
                outcome.rendered = self.redraw().await;
            }
        }

        if self.automation.tick() {
            outcome.checked = true;
            outcome.commands = self
                .controller
                .actuate(&reading, &mut self.actuators)
                .await;
        }

        Ok(outcome)
    }

    /// Log sinks for one reading. Failures are reported and swallowed.
    async fn record(&mut self, reading: &Reading) {
        info!("{}", format_datetime(&reading.timestamp));
        info!("  CO2: {} ppm", reading.co2);
        info!("  Temperature: {:.1} °C", reading.temperature);
        info!("  Humidity: {:.1} %", reading.humidity);

        if let Some(csv_log) = &self.csv_log {
            if let Err(e) = csv_log.append(reading).await {
                error!("Failed to append to CSV log: {}", e);
            }
        }

        if let Some(telemetry) = self.telemetry.as_mut() {
            if let Err(e) = telemetry.post(reading).await {
                error!("Failed to send to telemetry endpoint: {}", e);
            }
        }
    }

    async fn redraw(&mut self) -> bool {
        let rendered = self
            .renderer
            .render(&self.history, self.last_reading.as_ref(), self.display.as_mut())
            .await;
        match rendered {
            Ok(()) => {
                debug!("Chart refreshed");
                true
            }
            Err(e) => {
                error!("Failed to refresh display: {}", e);
                false
            }
        }
    }

    /// Tick every `poll_interval` until `shutdown` resolves.
    ///
    /// Shutdown is only observed between ticks, so a tick in progress
    /// always completes.
    pub async fn run<F>(&mut self, poll_interval: Duration, shutdown: F) -> Result<(), SensorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Control loop running every {:?} (thresholds: {:?})",
            poll_interval,
            self.controller.thresholds()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, control loop stopped");
                    return Ok(());
                }
            }
            let outcome = self.tick(now_local()).await?;
            if !outcome.commands.is_empty() {
                debug!("Actuation check confirmed {} command(s)", outcome.commands.len());
            }
        }
    }
}

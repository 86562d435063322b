mod config;
mod control;
mod display;
mod models;
mod network;
mod sensor;
mod storage;
mod utils;

use log::{error, info, warn};
use std::path::PathBuf;

use config::{ControllerConfig, SensorSourceConfig};
use control::{ActuatorSet, ControlLoop};
use display::PbmDisplay;
use network::{Actuator, HttpTelemetry, KasaPlug, TelemetrySink};
use sensor::{LineFeedSensor, SensorError, SensorSource, SimulatedSensor};
use storage::CsvLog;
use utils::{local_offset, now_local};

// The SCD-4x only has a fresh measurement every 5 seconds
const SIMULATED_SENSOR_PERIOD: u32 = 5;

async fn open_sensor(source: &SensorSourceConfig) -> Result<Box<dyn SensorSource>, SensorError> {
    let sensor: Box<dyn SensorSource> = match source {
        SensorSourceConfig::Simulated => {
            info!("Using simulated sensor");
            Box::new(SimulatedSensor::new(SIMULATED_SENSOR_PERIOD))
        }
        SensorSourceConfig::Stdin => Box::new(LineFeedSensor::stdin()),
        SensorSourceConfig::Path(path) => Box::new(LineFeedSensor::open(path).await?),
    };
    Ok(sensor)
}

fn build_actuators(config: &ControllerConfig) -> ActuatorSet {
    let plug = |addr: &Option<String>| -> Option<Box<dyn Actuator>> {
        addr.as_deref()
            .map(|addr| Box::new(KasaPlug::new(addr, config.network_timeout)) as Box<dyn Actuator>)
    };
    let actuators = ActuatorSet {
        heater: plug(&config.heater_addr),
        fan: plug(&config.fan_addr),
    };
    if actuators.heater.is_none() {
        warn!("HEATER_PLUG_ADDR not set, heater control disabled");
    }
    if actuators.fan.is_none() {
        warn!("FAN_PLUG_ADDR not set, fan control disabled");
    }
    actuators
}

async fn main_loop(
    config: ControllerConfig,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting air monitor");

    let sensor = open_sensor(&config.sensor_source).await?;
    let display = PbmDisplay::new(&config.display_output);
    info!("Rendering chart to {}", display.path().display());

    let mut control = ControlLoop::new(
        config.cadence,
        config.thresholds,
        sensor,
        Box::new(display),
        now_local(),
    )
    .with_csv_log(CsvLog::new(&config.csv_log_path))
    .with_actuators(build_actuators(&config));

    if let Some(url) = &config.telemetry_url {
        let telemetry = HttpTelemetry::new(url, config.network_timeout)?;
        info!("Posting readings to {}", telemetry.endpoint());
        control = control.with_telemetry(Box::new(telemetry) as Box<dyn TelemetrySink>);
    }

    if let Some(addr) = config.data_server_addr.clone() {
        let log_path = PathBuf::from(&config.csv_log_path);
        tokio::spawn(async move {
            if let Err(e) = storage::data_server::serve(&addr, log_path).await {
                error!("Data server on {} failed: {}", addr, e);
            }
        });
    }

    control.start().await;

    match control.run(config.poll_interval, shutdown).await {
        Ok(()) => Ok(()),
        Err(SensorError::Closed) => {
            warn!("Sensor feed closed, stopping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Must happen before any other thread exists
    local_offset();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ControllerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully: the current tick finishes before exit
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the loop is not stopped
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });
    let shutdown = async move {
        let _ = rx.await;
    };

    match main_loop(config, shutdown).await {
        Ok(()) => info!("Program terminated. Exiting gracefully."),
        Err(e) => {
            error!("Fatal error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

use std::fmt;
use time::OffsetDateTime;

/// One raw sample as delivered by the sensor, before it is timestamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub co2: u16,
    pub temperature: f32,
    pub humidity: f32,
}

/// A timestamped sensor reading. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: OffsetDateTime,
    pub co2: u16,
    pub temperature: f32,
    pub humidity: f32,
}

impl Reading {
    pub fn new(timestamp: OffsetDateTime, sample: SensorSample) -> Self {
        Reading {
            timestamp,
            co2: sample.co2,
            temperature: sample.temperature,
            humidity: sample.humidity,
        }
    }
}

/// Mean CO2 over one aggregation window, stamped with the window's last reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedPoint {
    pub timestamp: OffsetDateTime,
    pub co2_avg: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorKind {
    Heater,
    Fan,
}

impl ActuatorKind {
    pub const ALL: [ActuatorKind; 2] = [ActuatorKind::Heater, ActuatorKind::Fan];

    pub fn index(self) -> usize {
        match self {
            ActuatorKind::Heater => 0,
            ActuatorKind::Fan => 1,
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorKind::Heater => write!(f, "heater"),
            ActuatorKind::Fan => write!(f, "fan"),
        }
    }
}

/// Request to switch one actuator to the given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub actuator: ActuatorKind,
    pub on: bool,
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.actuator, if self.on { "on" } else { "off" })
    }
}

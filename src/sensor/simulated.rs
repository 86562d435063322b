use std::f32::consts::TAU;

use crate::models::SensorSample;
use crate::sensor::{SensorError, SensorSource};

// Period of the synthetic CO2 and temperature swings, in delivered samples
const CO2_CYCLE: f32 = 240.0;
const TEMP_CYCLE: f32 = 360.0;

/// Deterministic stand-in for the SCD-4x: a room whose CO2 and temperature
/// drift up and down slowly.
///
/// Becomes ready once every `period` polls, the way the real sensor only
/// has a new measurement every few seconds.
pub struct SimulatedSensor {
    period: u32,
    polls: u32,
    produced: u32,
}

impl SimulatedSensor {
    pub fn new(period: u32) -> Self {
        SimulatedSensor {
            period: period.max(1),
            polls: 0,
            produced: 0,
        }
    }

    fn sample_at(step: u32) -> SensorSample {
        let co2_phase = step as f32 / CO2_CYCLE * TAU;
        let temp_phase = step as f32 / TEMP_CYCLE * TAU;
        SensorSample {
            co2: (450.0 + 400.0 * (1.0 - co2_phase.cos())).round() as u16,
            temperature: 20.5 + 2.5 * temp_phase.sin(),
            humidity: 42.0 + 4.0 * (temp_phase + 1.0).sin(),
        }
    }
}

impl SensorSource for SimulatedSensor {
    fn data_ready(&mut self) -> bool {
        self.polls = (self.polls + 1) % self.period;
        self.polls == 0
    }

    fn read(&mut self) -> Result<SensorSample, SensorError> {
        let sample = Self::sample_at(self.produced);
        self.produced = self.produced.wrapping_add(1);
        Ok(sample)
    }
}

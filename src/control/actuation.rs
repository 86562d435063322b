/// Hysteresis control of the heater and ventilation fan
use log::{debug, error, info, warn};

use crate::config::Thresholds;
use crate::models::{ActuatorCommand, ActuatorKind, Reading};
use crate::network::Actuator;

/// The physical actuators the controller may drive. Either may be absent.
#[derive(Default)]
pub struct ActuatorSet {
    pub heater: Option<Box<dyn Actuator>>,
    pub fan: Option<Box<dyn Actuator>>,
}

impl ActuatorSet {
    pub fn get_mut(&mut self, kind: ActuatorKind) -> Option<&mut Box<dyn Actuator>> {
        match kind {
            ActuatorKind::Heater => self.heater.as_mut(),
            ActuatorKind::Fan => self.fan.as_mut(),
        }
    }
}

/// Two independent on/off actuators, each with a dead band between its
/// low and high threshold.
///
/// `desired` mirrors the last state the device confirmed. It only changes
/// through `acknowledge`, so a command that fails is emitted again on the
/// next evaluation if conditions persist.
#[derive(Debug, Clone)]
pub struct ActuationController {
    thresholds: Thresholds,
    desired: [bool; 2],
}

impl ActuationController {
    pub fn new(thresholds: Thresholds) -> Self {
        ActuationController {
            thresholds,
            desired: [false; 2],
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn is_on(&self, kind: ActuatorKind) -> bool {
        self.desired[kind.index()]
    }

    /// Commands needed to bring the actuators in line with `reading`.
    ///
    /// Heater: off above `temp_high`, on below `temp_low`.
    /// Fan: on above `co2_high`, off below `co2_low`.
    /// Inside either band nothing is emitted, and a command is only emitted
    /// when it differs from the current state.
    pub fn evaluate(&self, reading: &Reading) -> Vec<ActuatorCommand> {
        let t = &self.thresholds;

        let heater = if reading.temperature > t.temp_high {
            Some(false)
        } else if reading.temperature < t.temp_low {
            Some(true)
        } else {
            None
        };

        let fan = if reading.co2 > t.co2_high {
            Some(true)
        } else if reading.co2 < t.co2_low {
            Some(false)
        } else {
            None
        };

        [(ActuatorKind::Heater, heater), (ActuatorKind::Fan, fan)]
            .into_iter()
            .filter_map(|(actuator, want)| want.map(|on| ActuatorCommand { actuator, on }))
            .filter(|cmd| self.is_on(cmd.actuator) != cmd.on)
            .collect()
    }

    /// Record that the device confirmed `cmd`.
    pub fn acknowledge(&mut self, cmd: ActuatorCommand) {
        self.desired[cmd.actuator.index()] = cmd.on;
    }

    /// Mirror the current relay state of every configured device.
    ///
    /// A device that cannot be queried is assumed off.
    pub async fn sync_from_devices(&mut self, actuators: &mut ActuatorSet) {
        for kind in ActuatorKind::ALL {
            let Some(device) = actuators.get_mut(kind) else {
                continue;
            };
            match device.get_state().await {
                Ok(on) => {
                    info!("{} at {} is {}", kind, device.address(), on_off(on));
                    self.desired[kind.index()] = on;
                }
                Err(e) => {
                    warn!(
                        "Could not read {} state at {}, assuming off: {}",
                        kind,
                        device.address(),
                        e
                    );
                    self.desired[kind.index()] = false;
                }
            }
        }
    }

    /// Evaluate `reading` and dispatch the resulting commands.
    ///
    /// Returns the commands the devices confirmed. Failures are logged and
    /// leave the desired state untouched.
    pub async fn actuate(
        &mut self,
        reading: &Reading,
        actuators: &mut ActuatorSet,
    ) -> Vec<ActuatorCommand> {
        let mut confirmed = Vec::new();

        for cmd in self.evaluate(reading) {
            let Some(device) = actuators.get_mut(cmd.actuator) else {
                debug!("No {} configured, skipping '{}'", cmd.actuator, cmd);
                continue;
            };
            match device.set_state(cmd.on).await {
                Ok(()) => {
                    info!("Switched {} at {}", cmd, device.address());
                    self.acknowledge(cmd);
                    confirmed.push(cmd);
                }
                Err(e) => {
                    error!("Failed to switch {} at {}: {}", cmd, device.address(), e);
                }
            }
        }

        confirmed
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorSample;
    use crate::network::NetworkError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use time::macros::datetime;

    fn thresholds() -> Thresholds {
        Thresholds {
            co2_high: 1000,
            co2_low: 600,
            temp_high: 22.0,
            temp_low: 19.0,
        }
    }

    fn reading(co2: u16, temperature: f32) -> Reading {
        Reading::new(
            datetime!(2024-01-01 12:00:00 UTC),
            SensorSample {
                co2,
                temperature,
                humidity: 45.0,
            },
        )
    }

    /// Fake plug that records every accepted command.
    struct FakePlug {
        on: bool,
        fail: Arc<Mutex<bool>>,
        log: Arc<Mutex<Vec<bool>>>,
    }

    impl FakePlug {
        fn new(on: bool) -> (Self, Arc<Mutex<bool>>, Arc<Mutex<Vec<bool>>>) {
            let fail = Arc::new(Mutex::new(false));
            let log = Arc::new(Mutex::new(Vec::new()));
            let plug = FakePlug {
                on,
                fail: fail.clone(),
                log: log.clone(),
            };
            (plug, fail, log)
        }
    }

    #[async_trait]
    impl Actuator for FakePlug {
        fn address(&self) -> &str {
            "fake"
        }

        async fn get_state(&mut self) -> Result<bool, NetworkError> {
            if *self.fail.lock().unwrap() {
                return Err(NetworkError::Protocol("unreachable".into()));
            }
            Ok(self.on)
        }

        async fn set_state(&mut self, on: bool) -> Result<(), NetworkError> {
            if *self.fail.lock().unwrap() {
                return Err(NetworkError::Protocol("unreachable".into()));
            }
            self.on = on;
            self.log.lock().unwrap().push(on);
            Ok(())
        }
    }

    #[test]
    fn heater_follows_temperature_band() {
        let controller = ActuationController::new(thresholds());
        assert_eq!(
            controller.evaluate(&reading(800, 17.5)),
            vec![ActuatorCommand {
                actuator: ActuatorKind::Heater,
                on: true
            }]
        );
        // Already off, so a hot room needs no command
        assert!(controller.evaluate(&reading(800, 25.0)).is_empty());
    }

    #[test]
    fn dead_band_never_commands_the_heater() {
        for heater_on in [false, true] {
            let mut controller = ActuationController::new(thresholds());
            controller.acknowledge(ActuatorCommand {
                actuator: ActuatorKind::Heater,
                on: heater_on,
            });
            for temp in [19.0, 19.5, 20.5, 21.9, 22.0] {
                let cmds = controller.evaluate(&reading(800, temp));
                assert!(
                    cmds.iter().all(|c| c.actuator != ActuatorKind::Heater),
                    "heater commanded at {temp} with prior state {heater_on}"
                );
            }
        }
    }

    #[test]
    fn fan_and_heater_are_independent() {
        let controller = ActuationController::new(thresholds());
        let cmds = controller.evaluate(&reading(1500, 15.0));
        assert_eq!(cmds.len(), 2);
        assert!(cmds.contains(&ActuatorCommand {
            actuator: ActuatorKind::Heater,
            on: true
        }));
        assert!(cmds.contains(&ActuatorCommand {
            actuator: ActuatorKind::Fan,
            on: true
        }));
    }

    #[tokio::test]
    async fn low_then_high_co2_only_turns_fan_on() {
        let (plug, _, log) = FakePlug::new(false);
        let mut actuators = ActuatorSet {
            heater: None,
            fan: Some(Box::new(plug)),
        };
        let mut controller = ActuationController::new(thresholds());

        controller.actuate(&reading(500, 20.0), &mut actuators).await;
        controller.actuate(&reading(1100, 20.0), &mut actuators).await;

        assert_eq!(*log.lock().unwrap(), vec![true]);
        assert!(controller.is_on(ActuatorKind::Fan));
    }

    #[tokio::test]
    async fn high_then_low_co2_cycles_the_fan() {
        let (plug, _, log) = FakePlug::new(false);
        let mut actuators = ActuatorSet {
            heater: None,
            fan: Some(Box::new(plug)),
        };
        let mut controller = ActuationController::new(thresholds());

        controller.actuate(&reading(1100, 20.0), &mut actuators).await;
        controller.actuate(&reading(500, 20.0), &mut actuators).await;

        assert_eq!(*log.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn repeated_reading_is_idempotent() {
        let (plug, _, log) = FakePlug::new(false);
        let mut actuators = ActuatorSet {
            heater: Some(Box::new(plug)),
            fan: None,
        };
        let mut controller = ActuationController::new(thresholds());

        let first = controller.actuate(&reading(700, 16.0), &mut actuators).await;
        let second = controller.actuate(&reading(700, 16.0), &mut actuators).await;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn failed_command_is_retried_next_check() {
        let (plug, fail, log) = FakePlug::new(false);
        let mut actuators = ActuatorSet {
            heater: None,
            fan: Some(Box::new(plug)),
        };
        let mut controller = ActuationController::new(thresholds());

        *fail.lock().unwrap() = true;
        let confirmed = controller.actuate(&reading(1300, 20.0), &mut actuators).await;
        assert!(confirmed.is_empty());
        assert!(!controller.is_on(ActuatorKind::Fan));

        *fail.lock().unwrap() = false;
        let confirmed = controller.actuate(&reading(1300, 20.0), &mut actuators).await;
        assert_eq!(
            confirmed,
            vec![ActuatorCommand {
                actuator: ActuatorKind::Fan,
                on: true
            }]
        );
        assert_eq!(*log.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn missing_device_leaves_state_unchanged() {
        let mut actuators = ActuatorSet::default();
        let mut controller = ActuationController::new(thresholds());
        let confirmed = controller.actuate(&reading(1300, 15.0), &mut actuators).await;
        assert!(confirmed.is_empty());
        assert!(!controller.is_on(ActuatorKind::Heater));
        assert!(!controller.is_on(ActuatorKind::Fan));
    }

    #[tokio::test]
    async fn sync_mirrors_device_state() {
        let (heater, _, _) = FakePlug::new(true);
        let (fan, fan_fail, _) = FakePlug::new(true);
        *fan_fail.lock().unwrap() = true;
        let mut actuators = ActuatorSet {
            heater: Some(Box::new(heater)),
            fan: Some(Box::new(fan)),
        };
        let mut controller = ActuationController::new(thresholds());

        controller.sync_from_devices(&mut actuators).await;

        assert!(controller.is_on(ActuatorKind::Heater));
        assert!(!controller.is_on(ActuatorKind::Fan));
    }
}

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be at least 1")]
    ZeroCadence(&'static str),
    #[error("{low_key} ({low}) must be below {high_key} ({high})")]
    Inverted {
        low_key: &'static str,
        high_key: &'static str,
        low: f32,
        high: f32,
    },
}

/// Hysteresis thresholds, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub co2_high: u16,
    pub co2_low: u16,
    pub temp_high: f32,
    pub temp_low: f32,
}

/// The three independent decimation rates of the control loop
///
/// They are not required to be equal and nothing downstream assumes
/// they line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    /// N: readings averaged into one smoothed point
    pub samples_per_bin: u32,
    /// K: smoothed points retained for the chart
    pub history_len: usize,
    /// M: smoothed points between chart refreshes
    pub bins_per_refresh: u32,
    /// P: polls between actuation checks
    pub polls_per_check: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSourceConfig {
    Simulated,
    Stdin,
    Path(String),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub thresholds: Thresholds,
    pub cadence: Cadence,
    pub poll_interval: Duration,
    pub network_timeout: Duration,
    pub heater_addr: Option<String>,
    pub fan_addr: Option<String>,
    pub telemetry_url: Option<String>,
    pub csv_log_path: String,
    pub display_output: String,
    pub sensor_source: SensorSourceConfig,
    pub data_server_addr: Option<String>,
}

impl ControllerConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup, applying defaults for
    /// unset keys and validating the result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let thresholds = Thresholds {
            co2_high: parse_or(&lookup, "CO2_HIGH", 1000)?,
            co2_low: parse_or(&lookup, "CO2_LOW", 600)?,
            temp_high: parse_or(&lookup, "TEMP_HIGH", 22.0)?,
            temp_low: parse_or(&lookup, "TEMP_LOW", 19.0)?,
        };
        if thresholds.co2_low >= thresholds.co2_high {
            return Err(ConfigError::Inverted {
                low_key: "CO2_LOW",
                high_key: "CO2_HIGH",
                low: thresholds.co2_low as f32,
                high: thresholds.co2_high as f32,
            });
        }
        if !(thresholds.temp_low < thresholds.temp_high) {
            return Err(ConfigError::Inverted {
                low_key: "TEMP_LOW",
                high_key: "TEMP_HIGH",
                low: thresholds.temp_low,
                high: thresholds.temp_high,
            });
        }

        let cadence = Cadence {
            samples_per_bin: parse_positive(&lookup, "SAMPLES_PER_BIN", 60)?,
            history_len: parse_positive(&lookup, "HISTORY_LEN", 48)?,
            bins_per_refresh: parse_positive(&lookup, "BINS_PER_REFRESH", 5)?,
            polls_per_check: parse_positive(&lookup, "POLLS_PER_CHECK", 30)?,
        };

        let poll_interval =
            Duration::from_millis(parse_positive(&lookup, "POLL_INTERVAL_MS", 1000u64)?);
        let network_timeout =
            Duration::from_millis(parse_positive(&lookup, "NETWORK_TIMEOUT_MS", 3000u64)?);

        let sensor_source = match optional("SENSOR_SOURCE").as_deref() {
            None | Some("sim") => SensorSourceConfig::Simulated,
            Some("-") => SensorSourceConfig::Stdin,
            Some(path) => SensorSourceConfig::Path(path.to_string()),
        };

        Ok(ControllerConfig {
            thresholds,
            cadence,
            poll_interval,
            network_timeout,
            heater_addr: optional("HEATER_PLUG_ADDR"),
            fan_addr: optional("FAN_PLUG_ADDR"),
            telemetry_url: optional("TELEMETRY_URL"),
            csv_log_path: optional("CSV_LOG_PATH").unwrap_or_else(|| "air_quality.csv".into()),
            display_output: optional("DISPLAY_OUTPUT").unwrap_or_else(|| "display.pbm".into()),
            sensor_source,
            data_server_addr: optional("DATA_SERVER_ADDR"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw })
        }
        _ => Ok(default),
    }
}

fn parse_positive<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let value = parse_or(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::ZeroCadence(key));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ControllerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.thresholds.co2_high, 1000);
        assert_eq!(config.thresholds.co2_low, 600);
        assert_eq!(config.cadence.samples_per_bin, 60);
        assert_eq!(config.cadence.history_len, 48);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.sensor_source, SensorSourceConfig::Simulated);
        assert!(config.heater_addr.is_none());
        assert!(config.telemetry_url.is_none());
        assert_eq!(config.csv_log_path, "air_quality.csv");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config_from(&[
            ("CO2_HIGH", "1200"),
            ("CO2_LOW", " 800 "),
            ("TEMP_HIGH", "23.5"),
            ("TEMP_LOW", "20"),
            ("SAMPLES_PER_BIN", "4"),
            ("POLLS_PER_CHECK", "7"),
            ("FAN_PLUG_ADDR", "10.0.0.42"),
            ("SENSOR_SOURCE", "-"),
        ])
        .unwrap();
        assert_eq!(config.thresholds.co2_high, 1200);
        assert_eq!(config.thresholds.co2_low, 800);
        assert_eq!(config.thresholds.temp_high, 23.5);
        assert_eq!(config.cadence.samples_per_bin, 4);
        assert_eq!(config.cadence.polls_per_check, 7);
        assert_eq!(config.fan_addr.as_deref(), Some("10.0.0.42"));
        assert_eq!(config.sensor_source, SensorSourceConfig::Stdin);
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let err = config_from(&[("BINS_PER_REFRESH", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCadence("BINS_PER_REFRESH")));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = config_from(&[("CO2_HIGH", "500"), ("CO2_LOW", "600")]).unwrap_err();
        assert!(matches!(err, ConfigError::Inverted { low_key: "CO2_LOW", .. }));

        let err = config_from(&[("TEMP_HIGH", "18"), ("TEMP_LOW", "18")]).unwrap_err();
        assert!(matches!(err, ConfigError::Inverted { low_key: "TEMP_LOW", .. }));
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        let err = config_from(&[("TEMP_HIGH", "warm")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TEMP_HIGH", .. }));
    }

    #[test]
    fn sensor_path_is_kept_verbatim() {
        let config = config_from(&[("SENSOR_SOURCE", "/run/scd41.pipe")]).unwrap();
        assert_eq!(
            config.sensor_source,
            SensorSourceConfig::Path("/run/scd41.pipe".into())
        );
    }
}

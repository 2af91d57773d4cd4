//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `verdant.toml` in the working directory. Every field has a
//! sensible default so the file is optional; with no file at all the
//! daemon boots a small demo greenhouse (two fans, two LED panels, a
//! cooling rule, and a photoperiod schedule). Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use verdant_app::control::ControlConfig;
use verdant_domain::device::Device;
use verdant_domain::rule::{Condition, Operator, Rule, ScheduleWindow};
use verdant_domain::sensor::SensorKind;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Control loop timing and safety settings.
    pub control: ControlSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Controllable devices and their dependency edges.
    pub devices: Vec<DeviceConfig>,
    /// Automation rules, in the domain rule format.
    pub rules: Vec<Rule>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Control loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlSection {
    /// Seconds between control ticks.
    pub tick_interval_secs: u64,
    /// Budget for a single relay call, in milliseconds.
    pub step_timeout_ms: u64,
    /// Seconds between simulated sensor polls.
    pub sensor_poll_secs: u64,
    /// Override duration applied when a request omits one, in seconds.
    pub default_override_secs: u64,
    /// Consecutive sensor-starved ticks before degraded mode.
    pub degraded_after_misses: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One device entry from `[[devices]]`.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Config {
    /// Load configuration from `verdant.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("verdant.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VERDANT_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("VERDANT_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("VERDANT_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("VERDANT_TICK_SECS") {
            if let Ok(secs) = val.parse() {
                self.control.tick_interval_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("VERDANT_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.control.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "tick interval must be non-zero".to_string(),
            ));
        }
        if self.control.degraded_after_misses == 0 {
            return Err(ConfigError::Validation(
                "degraded_after_misses must be non-zero".to_string(),
            ));
        }
        if self.control.default_override_secs == 0 {
            return Err(ConfigError::Validation(
                "default override duration must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Devices as domain objects, ready for registry construction.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|device| {
                let mut built = Device::new(device.id.as_str(), device.name.as_str());
                for dep in &device.requires {
                    built = built.requires(dep.as_str());
                }
                built
            })
            .collect()
    }

    /// Control actor settings derived from the `[control]` section.
    #[must_use]
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            tick_interval: Duration::from_secs(self.control.tick_interval_secs),
            step_timeout: Duration::from_millis(self.control.step_timeout_ms),
            degraded_after_misses: self.control.degraded_after_misses,
        }
    }

    #[must_use]
    pub fn sensor_poll_interval(&self) -> Duration {
        Duration::from_secs(self.control.sensor_poll_secs)
    }

    #[must_use]
    pub fn default_override_ttl(&self) -> Duration {
        Duration::from_secs(self.control.default_override_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            control: ControlSection::default(),
            logging: LoggingConfig::default(),
            devices: default_devices(),
            rules: default_rules(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            step_timeout_ms: 2000,
            sensor_poll_secs: 2,
            default_override_secs: 600,
            degraded_after_misses: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "verdantd=info,verdant=info,tower_http=debug".to_string(),
        }
    }
}

/// Demo greenhouse: main/aux ventilation and two LED panels, the aux
/// hardware depending on the primary.
fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig {
            id: "ventilation_main".to_string(),
            name: "Main Ventilation Fan".to_string(),
            requires: Vec::new(),
        },
        DeviceConfig {
            id: "ventilation_aux".to_string(),
            name: "Auxiliary Ventilation Fan".to_string(),
            requires: vec!["ventilation_main".to_string()],
        },
        DeviceConfig {
            id: "led_primary".to_string(),
            name: "Primary LED Panel".to_string(),
            requires: vec!["ventilation_main".to_string()],
        },
        DeviceConfig {
            id: "led_secondary".to_string(),
            name: "Secondary LED Panel".to_string(),
            requires: vec!["led_primary".to_string()],
        },
    ]
}

fn default_rules() -> Vec<Rule> {
    let cool = Rule::builder()
        .name("Cool")
        .device("ventilation_main")
        .condition(Condition {
            kind: SensorKind::Temperature,
            operator: Operator::GreaterThan,
            threshold: 26.0,
        })
        .priority(5)
        .build();
    let photoperiod = Rule::builder()
        .name("Photoperiod")
        .device("led_primary")
        .window(ScheduleWindow {
            start: chrono_time(6, 0),
            end: chrono_time(22, 0),
        })
        .build();
    // The builders only fail on empty names/conditions, which these
    // literals never have.
    [cool, photoperiod].into_iter().flatten().collect()
}

fn chrono_time(hour: u32, minute: u32) -> chrono::NaiveTime {
    chrono::NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

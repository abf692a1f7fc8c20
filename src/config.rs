//! Configuration for setu-link
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [link]
//! uri = "serial:/dev/ttyUSB0?baud=115200"
//! layout = "split-pinout"        # required, "split-pinout" or "merged-pinout"
//! handshake_timeout_ms = 5000    # optional, absent waits forever
//!
//! [odometry]
//! base_radius = 0.15
//!
//! [[motor]]
//! num = 0
//! radius = 0.03
//! angle_degrees = 0
//! # ...
//!
//! [logging]
//! level = "info"
//! ```

use crate::dispatch::RegistrationPolicy;
use crate::error::{Error, Result};
use crate::odometry::OdometryGains;
use crate::protocol::{ConfigMotor, WireLayout};
use crate::transport::DeviceUri;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub link: LinkConfig,
    #[serde(default)]
    pub odometry: OdometryGains,
    /// One entry per wheel, in wheel index order
    #[serde(default, rename = "motor")]
    pub motors: Vec<ConfigMotor>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller link settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Device URI, e.g. `serial:/dev/ttyUSB0?baud=115200`
    pub uri: String,
    /// Firmware wire layout; there is no default
    pub layout: WireLayout,
    /// Give up waiting for the first controller message after this long
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_timeout_ms: Option<u64>,
    /// Handler re-registration policy
    #[serde(default)]
    pub registration: RegistrationPolicy,
}

impl LinkConfig {
    pub fn device_uri(&self) -> Result<DeviceUri> {
        DeviceUri::parse(&self.uri)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Install the global logger
    ///
    /// Safe to call more than once; later calls leave the first logger in place.
    pub fn init(&self) {
        let env = env_logger::Env::default().default_filter_or(self.level.as_str());
        if env_logger::Builder::from_env(env).try_init().is_err() {
            log::debug!("Logger already initialised, keeping existing one");
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_link::config::Config;
    ///
    /// let config = Config::load("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.link.device_uri()?;

        let gains = &self.odometry;
        if !(gains.base_radius.is_finite() && gains.base_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "odometry.base_radius must be positive, got {}",
                gains.base_radius
            )));
        }

        let mut seen = HashSet::new();
        for motor in &self.motors {
            if !seen.insert(motor.num) {
                return Err(Error::InvalidConfig(format!(
                    "motor {} configured twice",
                    motor.num
                )));
            }

            let has_pinout = motor.pinout.is_some();
            if has_pinout != self.link.layout.motor_has_pinout() {
                return Err(Error::InvalidConfig(format!(
                    "motor {}: pinout {} for layout {:?}",
                    motor.num,
                    if has_pinout { "not allowed" } else { "required" },
                    self.link.layout
                )));
            }
        }

        Ok(())
    }
}

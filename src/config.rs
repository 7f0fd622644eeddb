//! Daemon configuration.

use crate::error::{Result, StatusError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Highest BCM GPIO number exposed on the Raspberry Pi header.
pub const MAX_BCM_PIN: u8 = 27;

/// Configuration for the status daemon.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Glances REST API
    pub glances_url: String,
    /// Mount point whose backing md device is monitored
    pub raid_mount: String,
    /// Interface shown on the network page
    pub network_interface: String,
    /// BCM pin of the navigation button
    pub button_pin: u8,
    /// BCM pin of the piezo buzzer
    pub buzzer_pin: u8,
    /// Minimum seconds between two firings of the same level alarm
    pub alarm_cooldown_secs: u64,
    /// Disk temperature that raises a warning
    pub temp_warn_celsius: f32,
    /// Disk temperature that raises a critical alarm
    pub temp_critical_celsius: f32,
    /// Data refresh cadence in milliseconds
    pub data_interval_ms: u64,
    /// Display refresh cadence in milliseconds
    pub display_interval_ms: u64,
    /// Alarm check cadence in milliseconds
    pub alarm_interval_ms: u64,
    /// Inactivity before navigation returns home, in milliseconds
    pub nav_timeout_ms: u64,
    /// Upper bound on any single source fetch, in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            glances_url: crate::DEFAULT_GLANCES_URL.to_string(),
            raid_mount: crate::DEFAULT_RAID_MOUNT.to_string(),
            network_interface: "eth0".to_string(),
            button_pin: 4,
            buzzer_pin: 17,
            alarm_cooldown_secs: 300,
            temp_warn_celsius: 50.0,
            temp_critical_celsius: 60.0,
            data_interval_ms: 2_000,
            display_interval_ms: 200,
            alarm_interval_ms: 200,
            nav_timeout_ms: 10_000,
            fetch_timeout_ms: 1_000,
        }
    }
}

impl Config {
    /// Load a configuration file, falling back to defaults for missing keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            StatusError::config_error(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Set the Glances API base URL.
    pub fn with_glances_url(mut self, url: impl Into<String>) -> Self {
        self.glances_url = url.into();
        self
    }

    /// Set the monitored RAID mount point.
    pub fn with_raid_mount(mut self, mount: impl Into<String>) -> Self {
        self.raid_mount = mount.into();
        self
    }

    /// Set the button pin.
    pub fn with_button_pin(mut self, pin: u8) -> Self {
        self.button_pin = pin;
        self
    }

    /// Set the buzzer pin.
    pub fn with_buzzer_pin(mut self, pin: u8) -> Self {
        self.buzzer_pin = pin;
        self
    }

    /// Set the level alarm cooldown.
    pub fn with_alarm_cooldown_secs(mut self, secs: u64) -> Self {
        self.alarm_cooldown_secs = secs;
        self
    }

    /// Set the warning and critical disk temperature thresholds.
    pub fn with_temp_thresholds(mut self, warn: f32, critical: f32) -> Self {
        self.temp_warn_celsius = warn;
        self.temp_critical_celsius = critical;
        self
    }

    /// Set the data refresh cadence.
    pub fn with_data_interval_ms(mut self, ms: u64) -> Self {
        self.data_interval_ms = ms;
        self
    }

    /// Set the display refresh cadence.
    pub fn with_display_interval_ms(mut self, ms: u64) -> Self {
        self.display_interval_ms = ms;
        self
    }

    /// Set the alarm check cadence.
    pub fn with_alarm_interval_ms(mut self, ms: u64) -> Self {
        self.alarm_interval_ms = ms;
        self
    }

    /// Set the navigation inactivity timeout.
    pub fn with_nav_timeout_ms(mut self, ms: u64) -> Self {
        self.nav_timeout_ms = ms;
        self
    }

    /// Set the per-fetch timeout.
    pub fn with_fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    pub fn alarm_cooldown(&self) -> Duration {
        Duration::from_secs(self.alarm_cooldown_secs)
    }

    pub fn data_interval(&self) -> Duration {
        Duration::from_millis(self.data_interval_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    pub fn alarm_interval(&self) -> Duration {
        Duration::from_millis(self.alarm_interval_ms)
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// The scheduler tick: the faster of the alarm and display cadences.
    pub fn tick_interval(&self) -> Duration {
        self.alarm_interval().min(self.display_interval())
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, pin) in [("button_pin", self.button_pin), ("buzzer_pin", self.buzzer_pin)] {
            if pin > MAX_BCM_PIN {
                return Err(StatusError::config_error(format!(
                    "{} {} is outside BCM 0..={}",
                    name, pin, MAX_BCM_PIN
                )));
            }
        }
        if self.button_pin == self.buzzer_pin {
            return Err(StatusError::config_error(format!(
                "button and buzzer share pin {}",
                self.button_pin
            )));
        }

        if !self.temp_warn_celsius.is_finite() || !self.temp_critical_celsius.is_finite() {
            return Err(StatusError::config_error("temperature thresholds must be finite"));
        }
        if self.temp_warn_celsius >= self.temp_critical_celsius {
            return Err(StatusError::config_error(format!(
                "warning threshold {:.1}°C must be below critical threshold {:.1}°C",
                self.temp_warn_celsius, self.temp_critical_celsius
            )));
        }

        let intervals = [
            ("data_interval_ms", self.data_interval_ms),
            ("display_interval_ms", self.display_interval_ms),
            ("alarm_interval_ms", self.alarm_interval_ms),
            ("nav_timeout_ms", self.nav_timeout_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(StatusError::config_error(format!("{} must be non-zero", name)));
        }

        if self.glances_url.trim().is_empty() {
            return Err(StatusError::config_error("glances_url must not be empty"));
        }

        Ok(())
    }
}

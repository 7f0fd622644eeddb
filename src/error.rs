//! Error handling for the OLED status daemon.

use std::time::Duration;

/// A specialized `Result` type for status daemon operations.
pub type Result<T> = std::result::Result<T, StatusError>;

/// The main error type for status daemon operations.
///
/// Source failures never escape the scheduler loop: the cache turns them into
/// absent values. Only configuration and startup errors are fatal.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to the monitoring API failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON payload could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Source data parsing failed
    #[error("Failed to parse source data: {0}")]
    ParseError(String),

    /// External command failed or is absent
    #[error("Command error: {0}")]
    Command(String),

    /// A fetch exceeded its deadline
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// GPIO operation failed
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Display I/O failed
    #[error("Display error: {0}")]
    Display(String),

    /// RAID device missing or unreadable
    #[error("RAID error: {0}")]
    Raid(String),
}

impl StatusError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new command error
    pub fn command_error(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new display error
    pub fn display_error(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Create a new RAID error
    pub fn raid_error(msg: impl Into<String>) -> Self {
        Self::Raid(msg.into())
    }

    /// Whether this error is fatal at startup rather than a per-tick failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Toml(_) | Self::Raid(_))
    }
}

//! Error types for dac-trigger

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, validating or persisting settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A field is outside its allowed range
    #[error("{field} must be between {min} and {max} seconds (got {value})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Reading or writing the settings file failed
    #[error("Settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for a settings record
    #[error("Malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),

    /// No configuration directory could be determined
    #[error("No configuration directory available")]
    NoConfigDir,
}

/// Errors surfaced by the trigger service
#[derive(Error, Debug)]
pub enum TriggerError {
    /// Driving or sampling a line failed
    #[error("GPIO error: {0}")]
    Gpio(#[from] trigger_gpio::GpioError),

    /// Settings could not be loaded or saved
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The service loop is no longer running
    #[error("Trigger service has stopped")]
    ServiceStopped,

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for trigger operations
pub type Result<T> = std::result::Result<T, TriggerError>;

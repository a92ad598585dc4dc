//! Configuration types for the trigger service
//!
//! These control the service loop and the input debounce, not the user
//! settings (zone and delays), which live in [`crate::settings`].

use std::time::Duration;

use crate::arbitrator::DEBOUNCE_WINDOW;
use crate::error::TriggerError;

/// Configuration for the TriggerService
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Window in which a repeated request for the current state is dropped
    /// Default: 10 seconds
    pub debounce_window: Duration,

    /// Buffer size for the event channel
    /// Default: 64
    pub event_buffer_size: usize,

    /// Time a new input level must hold before it counts as an edge
    /// Default: 50 milliseconds
    pub input_debounce: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEBOUNCE_WINDOW,
            event_buffer_size: 64,
            input_debounce: Duration::from_millis(50),
        }
    }
}

impl TriggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), TriggerError> {
        if self.event_buffer_size == 0 {
            return Err(TriggerError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.input_debounce > Duration::from_secs(1) {
            return Err(TriggerError::Configuration(
                "Input debounce must not exceed 1 second".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_input_debounce(mut self, debounce: Duration) -> Self {
        self.input_debounce = debounce;
        self
    }
}

//! Believed DAC power state and change attribution

use std::fmt;

use serde::{Deserialize, Serialize};
use trigger_gpio::Level;

/// Believed power state of the DAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    On,
    Off,
    /// Not yet read from the board
    #[default]
    Unknown,
}

impl TriggerState {
    pub fn from_bool(on: bool) -> Self {
        if on {
            TriggerState::On
        } else {
            TriggerState::Off
        }
    }

    /// Output level that produces this state, if it is known
    pub fn level(self) -> Option<Level> {
        match self {
            TriggerState::On => Some(Level::High),
            TriggerState::Off => Some(Level::Low),
            TriggerState::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerState::On => "ON",
            TriggerState::Off => "OFF",
            TriggerState::Unknown => "UNKNOWN",
        }
    }
}

impl From<Level> for TriggerState {
    fn from(level: Level) -> Self {
        TriggerState::from_bool(level.is_high())
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subsystem credited with the most recent power transition
///
/// Display only. Nothing in the control path branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    /// The zone's playback state
    Roon,
    /// The external trigger input
    ExtTrigger,
    /// The DAC itself (its own timer, protection or power switch)
    Dac,
    /// A status refresh without a cause
    Status,
    #[default]
    Unknown,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Roon => "ROON",
            Actor::ExtTrigger => "EXT_TRIGGER",
            Actor::Dac => "DAC",
            Actor::Status => "STATUS",
            Actor::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! User settings: the zone to follow and the two delays
//!
//! The record is stored as JSON with the same keys the configuration surface
//! uses:
//!
//! ```json
//! { "zone": { "name": "Sabaj" }, "turnOnPause": 1, "turnOffPause": 10 }
//! ```
//!
//! Either delay may be the literal `"none"`, which hides the field from the
//! configuration surface and leaves the default in effect.

pub mod layout;
pub mod service;
pub mod store;

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub use layout::{FieldKind, LayoutField, SettingsLayout};
pub use service::{SaveOutcome, SaveStatus, SettingsService};
pub use store::{JsonFileStore, MemoryStore, SettingsStore};

/// Allowed turn-on delay in seconds
pub const TURN_ON_PAUSE_RANGE: RangeInclusive<i64> = 1..=20;
/// Allowed turn-off delay in seconds
pub const TURN_OFF_PAUSE_RANGE: RangeInclusive<i64> = 1..=3600;

pub const DEFAULT_TURN_ON_PAUSE: i64 = 1;
pub const DEFAULT_TURN_OFF_PAUSE: i64 = 10;

/// A delay setting: whole seconds, or disabled with `"none"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDelay", into = "RawDelay")]
pub enum Delay {
    Seconds(i64),
    Disabled,
}

impl Delay {
    pub fn is_disabled(self) -> bool {
        self == Delay::Disabled
    }

    /// Effective duration, using `default_secs` when disabled
    pub fn duration_or(self, default_secs: i64) -> Duration {
        let secs = match self {
            Delay::Seconds(secs) => secs,
            Delay::Disabled => default_secs,
        };
        Duration::from_secs(secs.max(0).unsigned_abs())
    }

    fn check(
        self,
        field: &'static str,
        range: &RangeInclusive<i64>,
    ) -> Result<(), SettingsError> {
        match self {
            Delay::Seconds(value) if !range.contains(&value) => Err(SettingsError::OutOfRange {
                field,
                value,
                min: *range.start(),
                max: *range.end(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDelay {
    Seconds(i64),
    Text(String),
}

impl TryFrom<RawDelay> for Delay {
    type Error = String;

    fn try_from(raw: RawDelay) -> Result<Self, Self::Error> {
        match raw {
            RawDelay::Seconds(secs) => Ok(Delay::Seconds(secs)),
            RawDelay::Text(text) if text == "none" => Ok(Delay::Disabled),
            RawDelay::Text(text) => Err(format!("expected seconds or \"none\", got {:?}", text)),
        }
    }
}

impl From<Delay> for RawDelay {
    fn from(delay: Delay) -> Self {
        match delay {
            Delay::Seconds(secs) => RawDelay::Seconds(secs),
            Delay::Disabled => RawDelay::Text("none".to_string()),
        }
    }
}

/// The configured zone, as selected on the configuration surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSetting {
    pub name: String,
}

/// The persisted settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub zone: Option<ZoneSetting>,

    #[serde(default = "default_turn_on_pause")]
    pub turn_on_pause: Delay,

    #[serde(default = "default_turn_off_pause")]
    pub turn_off_pause: Delay,
}

fn default_turn_on_pause() -> Delay {
    Delay::Seconds(DEFAULT_TURN_ON_PAUSE)
}

fn default_turn_off_pause() -> Delay {
    Delay::Seconds(DEFAULT_TURN_OFF_PAUSE)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zone: None,
            turn_on_pause: default_turn_on_pause(),
            turn_off_pause: default_turn_off_pause(),
        }
    }
}

impl Settings {
    // Builders

    pub fn with_zone(mut self, name: impl Into<String>) -> Self {
        self.zone = Some(ZoneSetting { name: name.into() });
        self
    }

    pub fn with_turn_on_pause(mut self, secs: i64) -> Self {
        self.turn_on_pause = Delay::Seconds(secs);
        self
    }

    pub fn with_turn_off_pause(mut self, secs: i64) -> Self {
        self.turn_off_pause = Delay::Seconds(secs);
        self
    }

    pub fn zone_name(&self) -> Option<&str> {
        self.zone.as_ref().map(|z| z.name.as_str())
    }

    /// How long playback stays paused while the DAC powers up
    pub fn turn_on_delay(&self) -> Duration {
        self.turn_on_pause.duration_or(DEFAULT_TURN_ON_PAUSE)
    }

    /// How long after stop the DAC is powered down
    pub fn turn_off_delay(&self) -> Duration {
        self.turn_off_pause.duration_or(DEFAULT_TURN_OFF_PAUSE)
    }

    /// Check every enabled delay against its range
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.turn_on_pause
            .check("turnOnPause", &TURN_ON_PAUSE_RANGE)?;
        self.turn_off_pause
            .check("turnOffPause", &TURN_OFF_PAUSE_RANGE)?;
        Ok(())
    }

    /// Render the configuration surface for these values
    pub fn layout(&self) -> SettingsLayout {
        SettingsLayout::for_settings(self)
    }
}

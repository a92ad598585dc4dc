//! Zone identity, zone records and subscription events

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlaybackState;

/// Opaque identifier of a playback zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        ZoneId::new(s)
    }
}

impl From<String> for ZoneId {
    fn from(s: String) -> Self {
        ZoneId::new(s)
    }
}

/// A zone as reported by the media system
///
/// Unknown fields in the feed (outputs, now playing, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: ZoneId,
    pub display_name: String,
    /// Raw state string, e.g. `"playing"`
    #[serde(default)]
    pub state: String,
}

impl Zone {
    pub fn new(
        zone_id: impl Into<ZoneId>,
        display_name: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            display_name: display_name.into(),
            state: state.into(),
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_zone_state(&self.state)
    }
}

/// Seek progress for a zone; carried by the feed but never acted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSeek {
    pub zone_id: ZoneId,
    #[serde(default)]
    pub seek_position: Option<i64>,
    #[serde(default)]
    pub queue_time_remaining: Option<i64>,
}

/// Incremental update to the zone list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones_changed: Option<Vec<Zone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones_added: Option<Vec<Zone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones_removed: Option<Vec<ZoneId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones_seek_changed: Option<Vec<ZoneSeek>>,
}

impl ZoneChanges {
    /// True when the update carries nothing but seek progress
    pub fn is_seek_only(&self) -> bool {
        self.zones_seek_changed.is_some()
            && self.zones_changed.is_none()
            && self.zones_added.is_none()
            && self.zones_removed.is_none()
    }
}

/// Messages of the zone subscription
///
/// Serialized as `{"cmd": "Subscribed", "data": {"zones": [...]}}` and
/// `{"cmd": "Changed", "data": {"zones_changed": [...]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum ZoneEvent {
    /// Full zone list, sent once when the subscription is established
    Subscribed { zones: Vec<Zone> },
    /// Incremental changes
    Changed(ZoneChanges),
}

/// What the tracker knows about its zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSnapshot {
    pub zone_id: ZoneId,
    pub display_name: String,
    pub playback_state: PlaybackState,
}

impl From<&Zone> for ZoneSnapshot {
    fn from(zone: &Zone) -> Self {
        Self {
            zone_id: zone.zone_id.clone(),
            display_name: zone.display_name.clone(),
            playback_state: zone.playback_state(),
        }
    }
}

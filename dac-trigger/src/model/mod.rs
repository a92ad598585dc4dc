//! Data model for trigger arbitration

pub mod playback_state;
pub mod trigger_state;
pub mod zone;

pub use playback_state::{PlaybackState, PowerDemand};
pub use trigger_state::{Actor, TriggerState};
pub use zone::{Zone, ZoneChanges, ZoneEvent, ZoneId, ZoneSeek, ZoneSnapshot};

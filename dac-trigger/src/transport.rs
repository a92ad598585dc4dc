//! Transport control seam towards the media system

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::model::ZoneId;

/// Transport commands the arbitrator issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Pause,
    Play,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Pause => f.write_str("pause"),
            Control::Play => f.write_str("play"),
        }
    }
}

/// Issues transport commands to a zone
///
/// Calls are fire-and-forget: implementations log their own failures and
/// never report them back. A lost pause or play corrects itself on the next
/// playback state change.
pub trait ZoneTransport: Send + 'static {
    fn control(&self, zone: &ZoneId, control: Control);
}

/// A transport command with the time it was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedControl {
    pub zone: ZoneId,
    pub control: Control,
    pub at: Instant,
}

/// Transport that records every command; clones share the record
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    issued: Arc<Mutex<Vec<IssuedControl>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> Vec<IssuedControl> {
        self.issued.lock().clone()
    }

    /// Just the commands, in order
    pub fn controls(&self) -> Vec<Control> {
        self.issued.lock().iter().map(|c| c.control).collect()
    }
}

impl ZoneTransport for RecordingTransport {
    fn control(&self, zone: &ZoneId, control: Control) {
        self.issued.lock().push(IssuedControl {
            zone: zone.clone(),
            control,
            at: Instant::now(),
        });
    }
}

//! Follows the playback state of the configured zone

use std::collections::HashMap;

use crate::model::{PlaybackState, Zone, ZoneChanges, ZoneEvent, ZoneId, ZoneSnapshot};

/// Tracks one zone by display name
///
/// A tracker with no matching zone holds no snapshot and ignores every
/// change until a zone with the configured name shows up.
#[derive(Debug, Default)]
pub struct ZoneTracker {
    zone_name: Option<String>,
    snapshot: Option<ZoneSnapshot>,
    /// Last known record of every zone, for re-selection
    zones: HashMap<ZoneId, Zone>,
}

impl ZoneTracker {
    pub fn new(zone_name: Option<String>) -> Self {
        Self {
            zone_name,
            ..Default::default()
        }
    }

    pub fn zone_name(&self) -> Option<&str> {
        self.zone_name.as_deref()
    }

    pub fn snapshot(&self) -> Option<&ZoneSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn zone_id(&self) -> Option<&ZoneId> {
        self.snapshot.as_ref().map(|s| &s.zone_id)
    }

    /// Apply a subscription event
    ///
    /// Returns the tracked zone's playback state when it changed (or was
    /// first established), which is what the arbitrator acts on.
    pub fn handle(&mut self, event: ZoneEvent) -> Option<PlaybackState> {
        match event {
            ZoneEvent::Subscribed { zones } => self.on_subscribed(zones),
            ZoneEvent::Changed(changes) => self.on_changed(changes),
        }
    }

    /// Switch to another zone name and re-select from the known zones
    pub fn set_zone_name(&mut self, zone_name: Option<String>) -> Option<PlaybackState> {
        if zone_name == self.zone_name {
            return None;
        }
        tracing::info!("Tracking zone {:?} (was {:?})", zone_name, self.zone_name);
        self.zone_name = zone_name;
        self.snapshot = None;
        self.select()
    }

    fn on_subscribed(&mut self, zones: Vec<Zone>) -> Option<PlaybackState> {
        self.zones = zones.into_iter().map(|z| (z.zone_id.clone(), z)).collect();
        self.snapshot = None;

        let state = self.select();
        if self.snapshot.is_none() {
            tracing::info!(
                "No zone named {:?} among {} zones",
                self.zone_name,
                self.zones.len()
            );
        }
        state
    }

    fn on_changed(&mut self, changes: ZoneChanges) -> Option<PlaybackState> {
        if changes.is_seek_only() {
            return None;
        }

        let ZoneChanges {
            zones_changed,
            zones_added,
            zones_removed,
            ..
        } = changes;

        if zones_changed.is_none() && zones_added.is_none() && zones_removed.is_none() {
            tracing::debug!("Ignoring empty zone change");
            return None;
        }

        let mut result = None;

        for id in zones_removed.unwrap_or_default() {
            self.zones.remove(&id);
            if self.zone_id() == Some(&id) {
                tracing::info!("Tracked zone {} was removed", id);
                self.snapshot = None;
            }
        }

        for zone in zones_added.unwrap_or_default() {
            self.zones.insert(zone.zone_id.clone(), zone);
        }
        if self.snapshot.is_none() {
            result = self.select();
        }

        for zone in zones_changed.unwrap_or_default() {
            self.zones.insert(zone.zone_id.clone(), zone.clone());

            let Some(snapshot) = self.snapshot.as_mut() else {
                continue;
            };
            if snapshot.zone_id != zone.zone_id {
                continue;
            }

            let state = zone.playback_state();
            if state != snapshot.playback_state {
                tracing::info!(
                    "Zone {} now {:?} (was {:?})",
                    snapshot.display_name,
                    state,
                    snapshot.playback_state
                );
                snapshot.playback_state = state;
                snapshot.display_name = zone.display_name;
                result = Some(state);
            }
        }

        result
    }

    /// Pick the zone whose display name matches, if any
    fn select(&mut self) -> Option<PlaybackState> {
        let name = self.zone_name.as_deref()?;
        let zone = self.zones.values().find(|z| z.display_name == name)?;
        let snapshot = ZoneSnapshot::from(zone);

        tracing::info!(
            "Tracking zone {} ({}), state {:?}",
            snapshot.display_name,
            snapshot.zone_id,
            snapshot.playback_state
        );
        let state = snapshot.playback_state;
        self.snapshot = Some(snapshot);
        Some(state)
    }
}

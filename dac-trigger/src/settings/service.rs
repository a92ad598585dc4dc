//! The settings update protocol

use serde::Serialize;

use super::{Settings, SettingsLayout, SettingsStore};

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveStatus {
    Success,
    NotValid,
}

/// Reply to a save request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub status: SaveStatus,
    /// Layout of the submitted values, with per-field errors
    pub settings: SettingsLayout,
    /// Whether the values were written to the store
    pub persisted: bool,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SaveStatus::Success
    }
}

/// Owns the current settings and their store
pub struct SettingsService<S> {
    current: Settings,
    store: S,
}

impl<S: SettingsStore> SettingsService<S> {
    /// Load settings from `store`
    ///
    /// Missing, unreadable or out-of-range records fall back to defaults; none
    /// of these stop the service from starting.
    pub fn load(store: S) -> Self {
        let current = match store.load() {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    tracing::warn!("Stored settings are invalid ({}), using defaults", e);
                    Settings::default()
                }
            },
            Ok(None) => {
                tracing::info!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load settings ({}), using defaults", e);
                Settings::default()
            }
        };

        Self { current, store }
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    /// Layout of the current settings
    pub fn layout(&self) -> SettingsLayout {
        self.current.layout()
    }

    /// Validate `settings` and, unless `dry_run`, commit and persist them
    ///
    /// Invalid values are rejected with `NotValid` and the previous settings
    /// stay in place. A store failure after validation still commits the
    /// values in memory; `persisted` reports whether the write succeeded.
    pub fn save(&mut self, settings: Settings, dry_run: bool) -> SaveOutcome {
        let layout = settings.layout();

        if layout.has_error {
            tracing::info!("Rejected settings: {}", layout.errors().join(" "));
            return SaveOutcome {
                status: SaveStatus::NotValid,
                settings: layout,
                persisted: false,
            };
        }

        if dry_run {
            return SaveOutcome {
                status: SaveStatus::Success,
                settings: layout,
                persisted: false,
            };
        }

        let persisted = match self.store.save(&settings) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to persist settings: {}", e);
                false
            }
        };

        tracing::info!(
            "Settings updated: zone={:?} turn_on={:?} turn_off={:?}",
            settings.zone_name(),
            settings.turn_on_delay(),
            settings.turn_off_delay()
        );
        self.current = settings;

        SaveOutcome {
            status: SaveStatus::Success,
            settings: layout,
            persisted,
        }
    }
}

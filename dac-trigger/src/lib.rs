//! # DAC Trigger
//!
//! Keeps an external DAC's power in step with a media zone's playback and
//! with a hardware trigger line.
//!
//! # Architecture
//!
//! ```text
//! zone events ──► ZoneTracker ──┐
//! P_Good edges ─────────────────┼──► TriggerService ──► Arbitrator ──► GpioPort
//! Trig_In edges ────────────────┘        (one loop)        │  ▲            │
//!                                                          │  └ DelayScheduler
//!                                                          ├──► ZoneTransport (pause/play)
//!                                                          └──► StatusSink
//! ```
//!
//! All events go through one channel and one loop, so the arbitrator's state
//! is never touched concurrently.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dac_trigger::{spawn_input_watchers, JsonFileStore, TracingStatus, TriggerConfig, TriggerService};
//! use trigger_gpio::{CdevGpio, PinMap, DEFAULT_CHIP};
//!
//! let port = CdevGpio::open(DEFAULT_CHIP, PinMap::default())?;
//! let config = TriggerConfig::default();
//! let (service, handle) = TriggerService::new(
//!     config.clone(),
//!     port.clone(),
//!     my_transport,
//!     TracingStatus,
//!     JsonFileStore::at_default_path()?,
//! )?;
//! let _watchers = spawn_input_watchers(port, &handle, &config);
//! tokio::spawn(service.run());
//!
//! handle.zone_event(event_from_media_system).await?;
//! ```

pub mod arbitrator;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod status;
pub mod tracker;
pub mod transport;

pub use arbitrator::{Arbitrator, ArbitratorState, LastWrite, WriteOutcome, DEBOUNCE_WINDOW};
pub use config::TriggerConfig;
pub use error::{Result, SettingsError, TriggerError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use model::{
    Actor, PlaybackState, PowerDemand, TriggerState, Zone, ZoneChanges, ZoneEvent, ZoneId,
    ZoneSnapshot,
};
pub use scheduler::{ActionKind, DelayScheduler, PendingAction};
pub use service::{spawn_input_watchers, TriggerEvent, TriggerHandle, TriggerService};
pub use settings::{
    Delay, JsonFileStore, MemoryStore, SaveOutcome, SaveStatus, Settings, SettingsLayout,
    SettingsService, SettingsStore,
};
pub use status::{Status, StatusBoard, StatusSink, TracingStatus};
pub use tracker::ZoneTracker;
pub use transport::{Control, IssuedControl, RecordingTransport, ZoneTransport};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::{
        Actor, Control, PlaybackState, Settings, TriggerConfig, TriggerEvent, TriggerHandle,
        TriggerService, TriggerState, ZoneEvent, ZoneId, ZoneTransport,
    };
}

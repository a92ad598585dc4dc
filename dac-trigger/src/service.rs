//! The service loop
//!
//! Zone events, input edges and settings requests all arrive on one channel
//! and are handled one at a time by [`TriggerService::run`]. Delayed actions
//! are serviced by the same loop, which sleeps until the scheduler's next
//! deadline, so no handler ever runs concurrently with another and the
//! arbitrator needs no locking.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use trigger_gpio::{EdgeWatcher, GpioError, GpioPort, Level, Line, WatchHandle};

use crate::arbitrator::Arbitrator;
use crate::config::TriggerConfig;
use crate::error::{Result, TriggerError};
use crate::model::ZoneEvent;
use crate::settings::{SaveOutcome, Settings, SettingsLayout, SettingsService, SettingsStore};
use crate::status::StatusSink;
use crate::tracker::ZoneTracker;
use crate::transport::ZoneTransport;

/// Everything the service reacts to
#[derive(Debug)]
pub enum TriggerEvent {
    /// A message from the zone subscription
    Zone(ZoneEvent),
    /// Power-Good changed level, or could not be read
    PowerGoodEdge(std::result::Result<Level, GpioError>),
    /// External-Trigger changed level, or could not be read
    ExternalTriggerEdge(std::result::Result<Level, GpioError>),
    /// Validate and (unless `dry_run`) apply new settings
    SaveSettings {
        settings: Settings,
        dry_run: bool,
        reply: oneshot::Sender<SaveOutcome>,
    },
    /// Current settings as a layout
    GetSettings {
        reply: oneshot::Sender<SettingsLayout>,
    },
    Shutdown,
}

/// Cloneable sender side of a running service
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<TriggerEvent>,
}

impl TriggerHandle {
    pub async fn send(&self, event: TriggerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TriggerError::ServiceStopped)
    }

    pub async fn zone_event(&self, event: ZoneEvent) -> Result<()> {
        self.send(TriggerEvent::Zone(event)).await
    }

    pub async fn save_settings(&self, settings: Settings, dry_run: bool) -> Result<SaveOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(TriggerEvent::SaveSettings {
            settings,
            dry_run,
            reply,
        })
        .await?;
        rx.await.map_err(|_| TriggerError::ServiceStopped)
    }

    pub async fn settings(&self) -> Result<SettingsLayout> {
        let (reply, rx) = oneshot::channel();
        self.send(TriggerEvent::GetSettings { reply }).await?;
        rx.await.map_err(|_| TriggerError::ServiceStopped)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(TriggerEvent::Shutdown).await
    }

    /// Raw sender, for event sources that map into [`TriggerEvent`] themselves
    pub fn sender(&self) -> mpsc::Sender<TriggerEvent> {
        self.tx.clone()
    }
}

/// Start edge watchers on Power-Good and External-Trigger feeding `handle`
pub fn spawn_input_watchers<P: GpioPort>(
    port: P,
    handle: &TriggerHandle,
    config: &TriggerConfig,
) -> Vec<WatchHandle> {
    let watcher = |line| {
        EdgeWatcher::new(line).with_debounce(config.input_debounce)
    };

    vec![
        watcher(Line::PowerGood).spawn(port.clone(), handle.sender(), TriggerEvent::PowerGoodEdge),
        watcher(Line::ExternalTrigger).spawn(
            port,
            handle.sender(),
            TriggerEvent::ExternalTriggerEdge,
        ),
    ]
}

/// Owns all trigger state and processes events one at a time
pub struct TriggerService<P, T, S, St> {
    arbitrator: Arbitrator<P, T, S>,
    tracker: ZoneTracker,
    settings: SettingsService<St>,
    rx: mpsc::Receiver<TriggerEvent>,
}

impl<P, T, S, St> TriggerService<P, T, S, St>
where
    P: GpioPort,
    T: ZoneTransport,
    S: StatusSink,
    St: SettingsStore,
{
    pub fn new(
        config: TriggerConfig,
        port: P,
        transport: T,
        status: S,
        store: St,
    ) -> Result<(Self, TriggerHandle)> {
        config.validate()?;

        let settings = SettingsService::load(store);
        let tracker = ZoneTracker::new(settings.current().zone_name().map(str::to_string));
        let arbitrator = Arbitrator::new(port, transport, status, settings.current())
            .with_debounce_window(config.debounce_window);

        let (tx, rx) = mpsc::channel(config.event_buffer_size);

        Ok((
            Self {
                arbitrator,
                tracker,
                settings,
                rx,
            },
            TriggerHandle { tx },
        ))
    }

    pub fn arbitrator(&self) -> &Arbitrator<P, T, S> {
        &self.arbitrator
    }

    pub fn tracker(&self) -> &ZoneTracker {
        &self.tracker
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(mut self) -> Self {
        self.arbitrator.initialize();
        tracing::info!("Trigger service started");

        loop {
            let deadline = self.arbitrator.next_deadline();

            tokio::select! {
                biased;

                event = self.rx.recv() => match event {
                    Some(TriggerEvent::Shutdown) => {
                        tracing::info!("Trigger service received shutdown");
                        break;
                    }
                    Some(event) => self.dispatch(event, Instant::now()),
                    None => {
                        tracing::info!("All trigger handles dropped");
                        break;
                    }
                },

                _ = sleep_until(deadline) => {
                    self.arbitrator.fire_due(Instant::now());
                }
            }
        }

        tracing::info!("Trigger service stopped");
        self
    }

    fn dispatch(&mut self, event: TriggerEvent, now: Instant) {
        // A busy channel must not hold back an action that is already due
        self.arbitrator.fire_due(now);

        match event {
            TriggerEvent::Zone(event) => {
                let state = self.tracker.handle(event);
                self.arbitrator.set_zone(self.tracker.zone_id().cloned());
                if let Some(state) = state {
                    self.arbitrator.on_playback_state_changed(state, now);
                }
            }
            TriggerEvent::PowerGoodEdge(edge) => match edge {
                Ok(level) => self.arbitrator.on_power_good_edge(level, now),
                Err(e) => tracing::error!("There was an error watching {}: {}", Line::PowerGood, e),
            },
            TriggerEvent::ExternalTriggerEdge(edge) => match edge {
                Ok(level) => self.arbitrator.on_external_trigger_edge(level, now),
                Err(e) => {
                    tracing::error!("There was an error watching {}: {}", Line::ExternalTrigger, e)
                }
            },
            TriggerEvent::SaveSettings {
                settings,
                dry_run,
                reply,
            } => {
                let outcome = self.save_settings(settings, dry_run, now);
                if reply.send(outcome).is_err() {
                    tracing::debug!("Settings reply receiver dropped");
                }
            }
            TriggerEvent::GetSettings { reply } => {
                if reply.send(self.settings.layout()).is_err() {
                    tracing::debug!("Settings reply receiver dropped");
                }
            }
            TriggerEvent::Shutdown => {}
        }
    }

    fn save_settings(&mut self, settings: Settings, dry_run: bool, now: Instant) -> SaveOutcome {
        let outcome = self.settings.save(settings, dry_run);
        if dry_run || !outcome.is_success() {
            return outcome;
        }

        if !outcome.persisted {
            self.arbitrator
                .publish_error("Settings applied but could not be saved");
        }

        let current = self.settings.current().clone();
        self.arbitrator.apply_settings(&current);

        let state = self
            .tracker
            .set_zone_name(current.zone_name().map(str::to_string));
        self.arbitrator.set_zone(self.tracker.zone_id().cloned());
        if let Some(state) = state {
            self.arbitrator.on_playback_state_changed(state, now);
        }

        outcome
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

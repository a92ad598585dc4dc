//! Integration tests for the trigger service loop.
//!
//! These drive a running [`TriggerService`] through its handle against a
//! simulated board, with tokio's clock paused so the delays are exact.

use std::time::Duration;

use dac_trigger::{
    spawn_input_watchers, Control, MemoryStore, RecordingTransport, SaveStatus, Settings,
    StatusBoard, TriggerConfig, TriggerEvent, TriggerHandle, TriggerService, TriggerState, Zone,
    ZoneChanges, ZoneEvent, ZoneId,
};
use tokio::task::JoinHandle;
use trigger_gpio::{GpioError, Level, Line, MockGpio};

type Service = TriggerService<MockGpio, RecordingTransport, StatusBoard, MemoryStore>;

struct Harness {
    port: MockGpio,
    transport: RecordingTransport,
    status: StatusBoard,
    store: MemoryStore,
    handle: TriggerHandle,
    task: JoinHandle<Service>,
}

impl Harness {
    fn start() -> Self {
        Self::start_with(MockGpio::following())
    }

    fn start_with(port: MockGpio) -> Self {
        let settings = Settings::default()
            .with_zone("Living Room")
            .with_turn_on_pause(2)
            .with_turn_off_pause(5);
        let store = MemoryStore::with_settings(settings);
        let transport = RecordingTransport::new();
        let status = StatusBoard::new();

        let (service, handle) = TriggerService::new(
            TriggerConfig::default(),
            port.clone(),
            transport.clone(),
            status.clone(),
            store.clone(),
        )
        .expect("Failed to create service");

        Self {
            port,
            transport,
            status,
            store,
            handle,
            task: tokio::spawn(service.run()),
        }
    }

    /// Round-trip through the loop so every earlier event has been handled
    async fn sync(&self) {
        self.handle.settings().await.expect("Service stopped");
    }

    async fn zones(&self, zones: Vec<Zone>) {
        self.handle
            .zone_event(ZoneEvent::Subscribed { zones })
            .await
            .unwrap();
        self.sync().await;
    }

    async fn zone_state(&self, id: &str, name: &str, state: &str) {
        let changes = ZoneChanges {
            zones_changed: Some(vec![Zone::new(id, name, state)]),
            ..Default::default()
        };
        self.handle
            .zone_event(ZoneEvent::Changed(changes))
            .await
            .unwrap();
        self.sync().await;
    }

    fn dac_enable(&self) -> Level {
        self.port.level(Line::DacEnable)
    }

    async fn stop(self) -> Service {
        self.handle.shutdown().await.unwrap();
        self.task.await.expect("Service task panicked")
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_status_reflects_power_good() {
    let harness = Harness::start();
    harness.sync().await;

    assert_eq!(harness.status.current().text, "DAC Power: OFF by STATUS");
    assert!(harness.port.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_playing_powers_on_and_holds_playback() {
    let harness = Harness::start();
    harness
        .zones(vec![Zone::new("z1", "Living Room", "playing")])
        .await;

    // ON is written at once, on every output
    assert_eq!(harness.dac_enable(), Level::High);
    assert_eq!(harness.port.level(Line::TriggerOut1), Level::High);
    assert_eq!(harness.port.level(Line::TriggerOut2), Level::High);
    assert_eq!(harness.transport.controls(), vec![Control::Pause]);
    assert_eq!(harness.status.current().text, "DAC Power: ON by ROON");

    advance(1900).await;
    assert_eq!(harness.transport.controls(), vec![Control::Pause]);

    advance(200).await;
    let issued = harness.transport.issued();
    assert_eq!(issued.len(), 2);
    assert_eq!(issued[1].control, Control::Play);
    assert_eq!(issued[1].zone, ZoneId::new("z1"));
    assert!(issued[1].at - issued[0].at >= Duration::from_secs(2));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stopped_powers_off_after_delay() {
    let harness = Harness::start();
    harness
        .zones(vec![Zone::new("z1", "Living Room", "playing")])
        .await;
    advance(3000).await;

    harness.zone_state("z1", "Living Room", "stopped").await;

    advance(4900).await;
    assert_eq!(harness.dac_enable(), Level::High);

    advance(200).await;
    assert_eq!(harness.dac_enable(), Level::Low);
    assert_eq!(harness.status.current().text, "DAC Power: OFF by ROON");

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_resume_cancels_pending_power_off() {
    let harness = Harness::start();
    harness
        .zones(vec![Zone::new("z1", "Living Room", "playing")])
        .await;
    advance(3000).await;

    harness.zone_state("z1", "Living Room", "stopped").await;
    advance(1000).await;
    harness.zone_state("z1", "Living Room", "playing").await;

    advance(10_000).await;

    // The second ON falls inside the debounce window and nothing turned it off
    assert_eq!(harness.port.writes_to(Line::DacEnable), vec![Level::High]);
    assert_eq!(
        harness.transport.controls(),
        vec![Control::Pause, Control::Play]
    );

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_power_loss_forces_off_and_cancels_resume() {
    let harness = Harness::start();
    harness
        .zones(vec![Zone::new("z1", "Living Room", "playing")])
        .await;
    assert_eq!(harness.dac_enable(), Level::High);

    // The DAC drops out before the resume fires
    harness.port.set_input(Line::PowerGood, Level::Low);
    harness
        .handle
        .send(TriggerEvent::PowerGoodEdge(Ok(Level::Low)))
        .await
        .unwrap();
    harness.sync().await;

    assert_eq!(harness.dac_enable(), Level::Low);
    assert_eq!(harness.status.current().text, "DAC Power: OFF by DAC");

    advance(10_000).await;
    assert_eq!(
        harness.transport.controls(),
        vec![Control::Pause, Control::Pause]
    );

    let service = harness.stop().await;
    assert_eq!(service.arbitrator().trigger_state(), TriggerState::Off);
    assert!(service.arbitrator().next_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_external_trigger_drives_outputs() {
    let harness = Harness::start();
    let _watchers =
        spawn_input_watchers(harness.port.clone(), &harness.handle, &TriggerConfig::default());
    advance(100).await;

    harness.port.set_input(Line::ExternalTrigger, Level::High);
    advance(200).await;
    harness.sync().await;

    assert_eq!(harness.dac_enable(), Level::High);
    assert_eq!(harness.status.current().text, "DAC Power: ON by EXT_TRIGGER");

    harness.port.set_input(Line::ExternalTrigger, Level::Low);
    advance(200).await;
    harness.sync().await;

    assert_eq!(harness.dac_enable(), Level::Low);
    assert!(harness.transport.issued().is_empty());

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_gpio_error_edge_is_dropped() {
    let harness = Harness::start();

    harness
        .handle
        .send(TriggerEvent::PowerGoodEdge(Err(GpioError::Unavailable(
            Line::PowerGood,
        ))))
        .await
        .unwrap();
    harness
        .handle
        .send(TriggerEvent::ExternalTriggerEdge(Err(GpioError::Unavailable(
            Line::ExternalTrigger,
        ))))
        .await
        .unwrap();
    harness.sync().await;

    assert!(harness.port.writes().is_empty());
    assert_eq!(harness.status.current().text, "DAC Power: OFF by STATUS");

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_settings_are_rejected() {
    let harness = Harness::start();
    let before = harness.store.stored();

    let outcome = harness
        .handle
        .save_settings(Settings::default().with_turn_on_pause(25), false)
        .await
        .unwrap();

    assert_eq!(outcome.status, SaveStatus::NotValid);
    assert!(outcome.settings.has_error);
    assert!(!outcome.persisted);
    assert_eq!(harness.store.save_count(), 0);
    assert_eq!(harness.store.stored(), before);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_does_not_persist() {
    let harness = Harness::start();

    let outcome = harness
        .handle
        .save_settings(Settings::default().with_turn_off_pause(60), true)
        .await
        .unwrap();

    assert_eq!(outcome.status, SaveStatus::Success);
    assert_eq!(harness.store.save_count(), 0);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_switching_zone_follows_new_zone() {
    let harness = Harness::start();
    harness
        .zones(vec![
            Zone::new("z1", "Living Room", "paused"),
            Zone::new("z2", "Kitchen", "playing"),
        ])
        .await;
    assert_eq!(harness.dac_enable(), Level::Low);

    let outcome = harness
        .handle
        .save_settings(
            Settings::default()
                .with_zone("Kitchen")
                .with_turn_on_pause(2)
                .with_turn_off_pause(5),
            false,
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, SaveStatus::Success);
    assert!(outcome.persisted);
    assert_eq!(harness.store.save_count(), 1);

    assert_eq!(harness.dac_enable(), Level::High);
    let issued = harness.transport.issued();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].zone, ZoneId::new("z2"));

    // Changes to the old zone no longer count
    harness.zone_state("z1", "Living Room", "stopped").await;
    advance(10_000).await;
    assert_eq!(harness.dac_enable(), Level::High);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_service_stops_when_handles_dropped() {
    let harness = Harness::start();
    let Harness { handle, task, .. } = harness;

    drop(handle);
    let service = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("Service did not stop")
        .expect("Service task panicked");
    assert_eq!(service.arbitrator().trigger_state(), TriggerState::Off);
}

#[tokio::test(start_paused = true)]
async fn test_handle_errors_after_shutdown() {
    let harness = Harness::start();
    let handle = harness.handle.clone();
    harness.stop().await;

    assert!(handle.settings().await.is_err());
}

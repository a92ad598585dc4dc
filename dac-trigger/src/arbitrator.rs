//! The decision engine
//!
//! Three sources compete for the DAC: the tracked zone's playback state, the
//! DAC's own power-good feedback, and the external trigger input. The
//! arbitrator is the only writer of the output lines and the only owner of the
//! believed [`TriggerState`].
//!
//! ```text
//! playing/loading ──► cancel TURN_OFF, pause + arm TURN_ON, write ON
//! stopped         ──► cancel TURN_ON, arm TURN_OFF ──(delay)──► write OFF
//! Trig_In edge    ──► write level
//! P_Good edge     ──► reconcile; on power loss pause, force OFF, disarm
//! ```
//!
//! A request for the state already believed is dropped when the last write is
//! less than [`DEBOUNCE_WINDOW`] old. Every method takes `now` explicitly so the
//! timing rules can be driven deterministically.

use std::time::Duration;

use tokio::time::Instant;
use trigger_gpio::{GpioPort, Level, Line};

use crate::model::{Actor, PlaybackState, PowerDemand, TriggerState, ZoneId};
use crate::scheduler::{ActionKind, DelayScheduler, PendingAction};
use crate::settings::Settings;
use crate::status::{Status, StatusSink};
use crate::transport::{Control, ZoneTransport};

/// Window in which a repeated request for the current state is a no-op
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10);

/// The most recent physical write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWrite {
    pub state: TriggerState,
    pub at: Instant,
}

/// Everything the arbitrator believes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbitratorState {
    pub trigger_state: TriggerState,
    pub actor: Actor,
    pub last_write: Option<LastWrite>,
}

/// What became of a power request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Same state requested inside the debounce window
    Suppressed,
    /// The port rejected the write
    Failed,
}

pub struct Arbitrator<P, T, S> {
    state: ArbitratorState,
    scheduler: DelayScheduler,
    port: P,
    transport: T,
    status: S,
    zone: Option<ZoneId>,
    turn_on_delay: Duration,
    turn_off_delay: Duration,
    debounce_window: Duration,
}

impl<P, T, S> Arbitrator<P, T, S>
where
    P: GpioPort,
    T: ZoneTransport,
    S: StatusSink,
{
    pub fn new(port: P, transport: T, status: S, settings: &Settings) -> Self {
        Self {
            state: ArbitratorState::default(),
            scheduler: DelayScheduler::new(),
            port,
            transport,
            status,
            zone: None,
            turn_on_delay: settings.turn_on_delay(),
            turn_off_delay: settings.turn_off_delay(),
            debounce_window: DEBOUNCE_WINDOW,
        }
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn state(&self) -> &ArbitratorState {
        &self.state
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.state.trigger_state
    }

    pub fn actor(&self) -> Actor {
        self.state.actor
    }

    pub fn scheduler(&self) -> &DelayScheduler {
        &self.scheduler
    }

    pub fn zone(&self) -> Option<&ZoneId> {
        self.zone.as_ref()
    }

    /// Zone that pause/play commands go to
    pub fn set_zone(&mut self, zone: Option<ZoneId>) {
        self.zone = zone;
    }

    /// Take new delays; already armed actions keep their deadlines
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.turn_on_delay = settings.turn_on_delay();
        self.turn_off_delay = settings.turn_off_delay();
    }

    /// Resolve the believed state from the lines and publish it
    pub fn initialize(&mut self) {
        self.state.actor = Actor::Status;
        self.refresh();
    }

    pub fn on_playback_state_changed(&mut self, playback: PlaybackState, now: Instant) {
        match playback.power_demand() {
            PowerDemand::On => {
                self.scheduler.cancel(ActionKind::TurnOff);

                if self.state.trigger_state != TriggerState::On
                    && !self.scheduler.is_pending(ActionKind::TurnOn)
                {
                    match self.zone.clone() {
                        Some(zone) => {
                            tracing::info!(
                                "Holding playback for {:?} while the DAC powers up",
                                self.turn_on_delay
                            );
                            self.transport.control(&zone, Control::Pause);
                            self.scheduler
                                .schedule(ActionKind::TurnOn, self.turn_on_delay, now);
                        }
                        None => tracing::warn!("No tracked zone to pause"),
                    }
                }

                self.request_trigger_state(true, Actor::Roon, now);
            }
            PowerDemand::Off => {
                self.scheduler.cancel(ActionKind::TurnOn);
                self.scheduler
                    .schedule(ActionKind::TurnOff, self.turn_off_delay, now);
                tracing::info!("DAC off in {:?} unless playback resumes", self.turn_off_delay);
            }
            PowerDemand::Keep => {
                tracing::debug!("No power decision for {:?}", playback);
            }
        }
    }

    pub fn on_external_trigger_edge(&mut self, level: Level, now: Instant) {
        tracing::info!("External trigger went {}", level);
        self.state.actor = Actor::ExtTrigger;
        self.request_trigger_state(level.is_high(), Actor::ExtTrigger, now);
    }

    pub fn on_power_good_edge(&mut self, level: Level, now: Instant) {
        let lines = self.read_lines();
        let driven = lines.map(|(dac_enable, _)| dac_enable).or_else(|| {
            self.state
                .last_write
                .and_then(|w| w.state.level())
        });
        let observed = lines.map(|(_, power_good)| power_good).unwrap_or(level);

        tracing::info!("Power good went {} (DAC enable {:?})", level, driven);

        if driven.is_some_and(|d| d != observed) {
            self.state.actor = Actor::Dac;
        }
        self.state.trigger_state = TriggerState::from(observed);
        self.publish();

        if observed == Level::Low && driven == Some(Level::High) {
            tracing::warn!("DAC lost power while enabled, powering down");
            if let Some(zone) = self.zone.clone() {
                self.transport.control(&zone, Control::Pause);
            }
            self.write(TriggerState::Off, Actor::Dac, now);
            self.scheduler.cancel(ActionKind::TurnOff);
            self.scheduler.cancel(ActionKind::TurnOn);
        }
    }

    /// Run a delayed action that has come due
    pub fn on_timer(&mut self, kind: ActionKind, now: Instant) {
        match kind {
            ActionKind::TurnOn => match self.zone.clone() {
                Some(zone) => {
                    tracing::info!("Resuming playback");
                    self.transport.control(&zone, Control::Play);
                }
                None => tracing::warn!("Tracked zone vanished before resume"),
            },
            ActionKind::TurnOff => {
                self.request_trigger_state(false, Actor::Roon, now);
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fire every action due at `now`
    pub fn fire_due(&mut self, now: Instant) -> Vec<PendingAction> {
        let due = self.scheduler.take_due(now);
        for action in &due {
            tracing::debug!("{} fired (token {})", action.kind, action.token);
            self.on_timer(action.kind, now);
        }
        due
    }

    /// Ask for the DAC to be on or off
    ///
    /// Dropped when the state is already believed and the last write is
    /// younger than the debounce window; otherwise every output is written.
    pub fn request_trigger_state(&mut self, on: bool, actor: Actor, now: Instant) -> WriteOutcome {
        let desired = TriggerState::from_bool(on);

        if desired == self.state.trigger_state {
            if let Some(last) = self.state.last_write {
                if now.saturating_duration_since(last.at) < self.debounce_window {
                    tracing::info!(
                        "Skipping no-op trigger change of {}, current state is {}",
                        desired,
                        self.state.trigger_state
                    );
                    return WriteOutcome::Suppressed;
                }
            }
        }

        self.write(desired, actor, now)
    }

    fn write(&mut self, desired: TriggerState, actor: Actor, now: Instant) -> WriteOutcome {
        let level = Level::from(desired == TriggerState::On);
        tracing::info!("Setting {} to {} ({})", Line::DacEnable, level, actor);

        if let Err(e) = self.port.write_outputs(level) {
            tracing::error!("Failed to drive outputs: {}", e);
            self.status
                .set_status(&format!("DAC Power: write failed ({})", e), true);
            return WriteOutcome::Failed;
        }

        self.state.last_write = Some(LastWrite { state: desired, at: now });
        self.state.actor = actor;
        self.refresh();
        WriteOutcome::Written
    }

    /// Read (DAC enable, power good); `None` if either read fails
    fn read_lines(&self) -> Option<(Level, Level)> {
        let read = |line: Line| {
            self.port
                .read(line)
                .map_err(|e| tracing::error!("Failed to read {}: {}", line, e))
                .ok()
        };
        Some((read(Line::DacEnable)?, read(Line::PowerGood)?))
    }

    fn refresh(&mut self) {
        if let Some((_, power_good)) = self.read_lines() {
            let state = TriggerState::from(power_good);
            if state != self.state.trigger_state {
                tracing::debug!("Trigger state was {} now {}", self.state.trigger_state, state);
            }
            self.state.trigger_state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        let status = Status::power(self.state.trigger_state, self.state.actor);
        self.status.set_status(&status.text, status.is_error);
    }

    /// Put an error line on the status surface
    pub fn publish_error(&self, text: &str) {
        self.status.set_status(text, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusBoard;
    use crate::transport::RecordingTransport;
    use proptest::prelude::*;
    use trigger_gpio::MockGpio;

    type TestArbitrator = Arbitrator<MockGpio, RecordingTransport, StatusBoard>;

    fn arbitrator(port: &MockGpio) -> (TestArbitrator, RecordingTransport, StatusBoard) {
        let transport = RecordingTransport::new();
        let status = StatusBoard::new();
        let settings = Settings::default()
            .with_turn_on_pause(2)
            .with_turn_off_pause(5);
        let mut arb = Arbitrator::new(port.clone(), transport.clone(), status.clone(), &settings);
        arb.set_zone(Some(ZoneId::new("1601")));
        arb.initialize();
        port.clear_writes();
        (arb, transport, status)
    }

    #[test]
    fn test_initialize_resolves_unknown() {
        let port = MockGpio::following();
        port.set_input(Line::PowerGood, Level::High);
        let transport = RecordingTransport::new();
        let status = StatusBoard::new();
        let mut arb = Arbitrator::new(port, transport, status.clone(), &Settings::default());

        assert_eq!(arb.trigger_state(), TriggerState::Unknown);
        arb.initialize();
        assert_eq!(arb.trigger_state(), TriggerState::On);
        assert_eq!(status.current().text, "DAC Power: ON by STATUS");
    }

    #[test]
    fn test_debounce_window_boundary() {
        let port = MockGpio::following();
        let (mut arb, _, _) = arbitrator(&port);
        let t0 = Instant::now();

        assert_eq!(arb.request_trigger_state(true, Actor::Roon, t0), WriteOutcome::Written);
        assert_eq!(
            arb.request_trigger_state(true, Actor::Roon, t0 + Duration::from_millis(9_999)),
            WriteOutcome::Suppressed
        );
        assert_eq!(port.writes_to(Line::DacEnable), vec![Level::High]);

        assert_eq!(
            arb.request_trigger_state(true, Actor::Roon, t0 + Duration::from_secs(10)),
            WriteOutcome::Written
        );
        assert_eq!(port.writes_to(Line::DacEnable), vec![Level::High, Level::High]);
    }

    #[test]
    fn test_write_drives_all_outputs() {
        let port = MockGpio::following();
        let (mut arb, _, status) = arbitrator(&port);

        arb.request_trigger_state(true, Actor::Roon, Instant::now());

        assert_eq!(
            port.writes(),
            vec![
                (Line::DacEnable, Level::High),
                (Line::TriggerOut1, Level::High),
                (Line::TriggerOut2, Level::High),
            ]
        );
        assert_eq!(arb.trigger_state(), TriggerState::On);
        assert_eq!(status.current().text, "DAC Power: ON by ROON");
    }

    #[test]
    fn test_opposite_state_is_never_suppressed() {
        let port = MockGpio::following();
        let (mut arb, _, _) = arbitrator(&port);
        let t0 = Instant::now();

        arb.request_trigger_state(true, Actor::Roon, t0);
        assert_eq!(
            arb.request_trigger_state(false, Actor::Roon, t0 + Duration::from_secs(1)),
            WriteOutcome::Written
        );
        assert_eq!(arb.trigger_state(), TriggerState::Off);
    }

    #[test]
    fn test_failed_write_does_not_record() {
        let port = MockGpio::following();
        let (mut arb, _, status) = arbitrator(&port);
        port.set_unavailable(Line::DacEnable, true);

        assert_eq!(
            arb.request_trigger_state(true, Actor::Roon, Instant::now()),
            WriteOutcome::Failed
        );
        assert!(arb.state().last_write.is_none());
        assert!(status.current().is_error);
    }

    #[test]
    fn test_playing_pauses_writes_and_arms_resume() {
        let port = MockGpio::following();
        let (mut arb, transport, _) = arbitrator(&port);
        let t0 = Instant::now();

        arb.on_playback_state_changed(PlaybackState::Playing, t0);

        assert_eq!(port.writes_to(Line::DacEnable), vec![Level::High]);
        assert_eq!(transport.controls(), vec![Control::Pause]);
        assert_eq!(
            arb.scheduler().pending(ActionKind::TurnOn).map(|a| a.fire_at),
            Some(t0 + Duration::from_secs(2))
        );

        assert!(arb.fire_due(t0 + Duration::from_millis(1_999)).is_empty());
        arb.fire_due(t0 + Duration::from_secs(2));
        assert_eq!(transport.controls(), vec![Control::Pause, Control::Play]);
    }

    #[test]
    fn test_playing_when_already_on_skips_pause() {
        let port = MockGpio::following();
        let (mut arb, transport, _) = arbitrator(&port);
        let t0 = Instant::now();
        arb.request_trigger_state(true, Actor::ExtTrigger, t0);

        arb.on_playback_state_changed(PlaybackState::Loading, t0 + Duration::from_secs(1));

        assert!(transport.controls().is_empty());
        assert!(!arb.scheduler().is_pending(ActionKind::TurnOn));
        // Already on and recently written
        assert_eq!(port.writes_to(Line::DacEnable), vec![Level::High]);
    }

    #[test]
    fn test_stopped_then_playing_cancels_off() {
        let port = MockGpio::following();
        let (mut arb, _, _) = arbitrator(&port);
        let t0 = Instant::now();
        arb.on_playback_state_changed(PlaybackState::Playing, t0);
        arb.fire_due(t0 + Duration::from_secs(2));

        arb.on_playback_state_changed(PlaybackState::Stopped, t0 + Duration::from_secs(20));
        assert!(arb.scheduler().is_pending(ActionKind::TurnOff));

        arb.on_playback_state_changed(PlaybackState::Playing, t0 + Duration::from_secs(22));
        assert!(!arb.scheduler().is_pending(ActionKind::TurnOff));

        arb.fire_due(t0 + Duration::from_secs(60));
        assert!(!port.writes_to(Line::DacEnable).contains(&Level::Low));
    }

    #[test]
    fn test_stopped_writes_off_after_delay() {
        let port = MockGpio::following();
        let (mut arb, _, _) = arbitrator(&port);
        let t0 = Instant::now();
        arb.request_trigger_state(true, Actor::Roon, t0);

        arb.on_playback_state_changed(PlaybackState::Stopped, t0 + Duration::from_secs(1));
        arb.fire_due(t0 + Duration::from_millis(5_999));
        assert_eq!(arb.trigger_state(), TriggerState::On);

        arb.fire_due(t0 + Duration::from_secs(6));
        assert_eq!(arb.trigger_state(), TriggerState::Off);
        assert_eq!(port.level(Line::DacEnable), Level::Low);
        assert_eq!(arb.actor(), Actor::Roon);
    }

    #[test]
    fn test_paused_makes_no_decision() {
        let port = MockGpio::following();
        let (mut arb, transport, _) = arbitrator(&port);

        arb.on_playback_state_changed(PlaybackState::Paused, Instant::now());
        arb.on_playback_state_changed(PlaybackState::Other, Instant::now());

        assert!(port.writes().is_empty());
        assert!(transport.controls().is_empty());
        assert_eq!(arb.next_deadline(), None);
    }

    #[test]
    fn test_external_trigger_writes_level() {
        let port = MockGpio::following();
        let (mut arb, _, status) = arbitrator(&port);

        arb.on_external_trigger_edge(Level::High, Instant::now());

        assert_eq!(port.level(Line::DacEnable), Level::High);
        assert_eq!(arb.actor(), Actor::ExtTrigger);
        assert_eq!(status.current().text, "DAC Power: ON by EXT_TRIGGER");
    }

    #[test]
    fn test_power_loss_pauses_forces_off_and_disarms() {
        let port = MockGpio::new();
        let (mut arb, transport, status) = arbitrator(&port);
        let t0 = Instant::now();

        // DAC came up after being enabled
        arb.request_trigger_state(true, Actor::Roon, t0);
        port.set_input(Line::PowerGood, Level::High);
        arb.on_power_good_edge(Level::High, t0 + Duration::from_secs(1));
        assert_eq!(arb.trigger_state(), TriggerState::On);
        assert_eq!(arb.actor(), Actor::Roon);

        arb.on_playback_state_changed(PlaybackState::Stopped, t0 + Duration::from_secs(2));
        assert!(arb.scheduler().is_pending(ActionKind::TurnOff));

        // DAC drops out on its own
        port.set_input(Line::PowerGood, Level::Low);
        arb.on_power_good_edge(Level::Low, t0 + Duration::from_secs(3));

        assert_eq!(transport.controls(), vec![Control::Pause]);
        assert_eq!(port.writes_to(Line::DacEnable).last(), Some(&Level::Low));
        assert_eq!(arb.actor(), Actor::Dac);
        assert_eq!(arb.trigger_state(), TriggerState::Off);
        assert!(!arb.scheduler().is_pending(ActionKind::TurnOff));
        assert_eq!(status.current().text, "DAC Power: OFF by DAC");
    }

    #[test]
    fn test_expected_power_good_edge_keeps_actor() {
        let port = MockGpio::new();
        let (mut arb, transport, _) = arbitrator(&port);
        let t0 = Instant::now();

        arb.request_trigger_state(false, Actor::Roon, t0);
        arb.on_power_good_edge(Level::Low, t0);

        assert_eq!(arb.actor(), Actor::Roon);
        assert!(transport.controls().is_empty());
    }

    #[test]
    fn test_dac_switched_on_by_itself() {
        let port = MockGpio::new();
        let (mut arb, _, _) = arbitrator(&port);

        port.set_input(Line::PowerGood, Level::High);
        arb.on_power_good_edge(Level::High, Instant::now());

        assert_eq!(arb.actor(), Actor::Dac);
        assert_eq!(arb.trigger_state(), TriggerState::On);
        assert!(port.writes().is_empty());
    }

    #[test]
    fn test_stale_low_edge_keeps_power() {
        let port = MockGpio::following();
        let (mut arb, transport, _) = arbitrator(&port);
        let t0 = Instant::now();
        arb.request_trigger_state(true, Actor::Roon, t0);
        port.clear_writes();

        // The edge says low but the line already reads high again
        arb.on_power_good_edge(Level::Low, t0 + Duration::from_secs(1));

        assert!(transport.controls().is_empty());
        assert!(port.writes().is_empty());
        assert_eq!(arb.trigger_state(), TriggerState::On);
        assert_eq!(arb.actor(), Actor::Roon);
    }

    #[test]
    fn test_stopped_during_power_up_cancels_resume() {
        let port = MockGpio::following();
        let (mut arb, transport, _) = arbitrator(&port);
        let t0 = Instant::now();

        arb.on_playback_state_changed(PlaybackState::Playing, t0);
        arb.on_playback_state_changed(PlaybackState::Stopped, t0 + Duration::from_secs(1));

        assert!(!arb.scheduler().is_pending(ActionKind::TurnOn));
        assert!(arb.scheduler().is_pending(ActionKind::TurnOff));

        arb.fire_due(t0 + Duration::from_secs(10));
        assert_eq!(transport.controls(), vec![Control::Pause]);
        assert_eq!(port.level(Line::DacEnable), Level::Low);
    }

    fn playback_strategy() -> impl Strategy<Value = PlaybackState> {
        prop_oneof![
            Just(PlaybackState::Playing),
            Just(PlaybackState::Loading),
            Just(PlaybackState::Paused),
            Just(PlaybackState::Stopped),
            Just(PlaybackState::Other),
        ]
    }

    proptest! {
        /// Power-up and power-down are never armed together
        #[test]
        fn prop_turn_on_and_off_never_both_pending(
            steps in proptest::collection::vec((playback_strategy(), 0u64..8), 1..60)
        ) {
            let port = MockGpio::following();
            let (mut arb, _, _) = arbitrator(&port);
            let mut now = Instant::now();

            for (playback, advance) in steps {
                arb.on_playback_state_changed(playback, now);
                prop_assert!(
                    !(arb.scheduler().is_pending(ActionKind::TurnOn)
                        && arb.scheduler().is_pending(ActionKind::TurnOff))
                );

                now += Duration::from_secs(advance);
                arb.fire_due(now);
                prop_assert!(
                    !(arb.scheduler().is_pending(ActionKind::TurnOn)
                        && arb.scheduler().is_pending(ActionKind::TurnOff))
                );
            }
        }
    }
}

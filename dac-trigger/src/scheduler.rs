//! Named, cancelable delayed actions
//!
//! The scheduler holds at most one pending action per [`ActionKind`].
//! Scheduling a kind replaces whatever was pending for it. Nothing here owns
//! a timer: the service loop sleeps until [`DelayScheduler::next_deadline`] and
//! then collects expired actions with [`DelayScheduler::take_due`], so a
//! canceled action can never fire late.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// The two delayed actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Resume playback once the DAC has had time to power up
    TurnOn,
    /// Power the DAC down after playback stopped
    TurnOff,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::TurnOn => f.write_str("TURN_ON"),
            ActionKind::TurnOff => f.write_str("TURN_OFF"),
        }
    }
}

/// An armed action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub fire_at: Instant,
    /// Distinguishes successive armings of the same kind
    pub token: u64,
}

#[derive(Debug, Default)]
pub struct DelayScheduler {
    pending: HashMap<ActionKind, PendingAction>,
    next_token: u64,
}

impl DelayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `delay` after `now`, replacing any pending arming
    pub fn schedule(&mut self, kind: ActionKind, delay: Duration, now: Instant) -> u64 {
        self.next_token += 1;
        let action = PendingAction {
            kind,
            fire_at: now + delay,
            token: self.next_token,
        };

        if let Some(previous) = self.pending.insert(kind, action) {
            tracing::debug!("Replaced pending {} (token {})", kind, previous.token);
        }
        tracing::debug!("Scheduled {} in {:?} (token {})", kind, delay, action.token);

        action.token
    }

    /// Disarm `kind`; returns whether anything was pending
    pub fn cancel(&mut self, kind: ActionKind) -> bool {
        match self.pending.remove(&kind) {
            Some(action) => {
                tracing::debug!("Canceled pending {} (token {})", kind, action.token);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, kind: ActionKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn pending(&self, kind: ActionKind) -> Option<&PendingAction> {
        self.pending.get(&kind)
    }

    /// Earliest deadline among pending actions
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|a| a.fire_at).min()
    }

    /// Remove and return every action due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingAction> {
        let mut due: Vec<PendingAction> = self
            .pending
            .values()
            .filter(|a| a.fire_at <= now)
            .copied()
            .collect();
        due.sort_by_key(|a| a.fire_at);

        for action in &due {
            self.pending.remove(&action.kind);
        }
        due
    }
}

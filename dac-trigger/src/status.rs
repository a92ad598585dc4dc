//! Status publishing
//!
//! The status surface holds exactly one human-readable line and an error
//! flag; every update replaces the previous one.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{Actor, TriggerState};

/// A published status line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

impl Status {
    /// `"DAC Power: ON by ROON"`
    pub fn power(state: TriggerState, actor: Actor) -> Self {
        Self {
            text: format!("DAC Power: {} by {}", state, actor),
            is_error: false,
        }
    }
}

/// Receives status updates from the arbitrator
pub trait StatusSink: Send + Sync + 'static {
    fn set_status(&self, text: &str, is_error: bool);
}

/// Logs every status update
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn set_status(&self, text: &str, is_error: bool) {
        if is_error {
            tracing::error!(target: "dac_trigger::status", "{}", text);
        } else {
            tracing::info!(target: "dac_trigger::status", "{}", text);
        }
    }
}

/// Latest status, observable through `tokio::sync::watch`
#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<Status>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for StatusBoard {
    fn set_status(&self, text: &str, is_error: bool) {
        tracing::debug!("Status: {}", text);
        self.tx.send_replace(Status {
            text: text.to_string(),
            is_error,
        });
    }
}

impl<T: StatusSink> StatusSink for Arc<T> {
    fn set_status(&self, text: &str, is_error: bool) {
        (**self).set_status(text, is_error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_status_text() {
        let status = Status::power(TriggerState::On, Actor::Roon);
        assert_eq!(status.text, "DAC Power: ON by ROON");
        assert!(!status.is_error);
    }

    #[test]
    fn test_board_replaces_status() {
        let board = StatusBoard::new();
        let rx = board.subscribe();

        board.set_status("first", false);
        board.set_status("second", true);

        assert_eq!(
            *rx.borrow(),
            Status {
                text: "second".to_string(),
                is_error: true
            }
        );
        assert_eq!(board.current().text, "second");
    }
}

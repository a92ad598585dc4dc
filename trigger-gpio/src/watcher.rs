//! Edge watching for input lines
//!
//! A watcher subscribes to the edges a port reports for one input line and
//! forwards level changes (rising and falling edges) to a channel. Nothing is
//! sampled: every transition the hardware delivers is seen, however short.
//!
//! An optional debounce interval requires a new level to hold for that long
//! before it is reported, which filters contact bounce and supply ripple on
//! the trigger inputs. With no debounce every edge is reported as it arrives.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;
use crate::line::{Level, Line};
use crate::port::GpioPort;

/// Turns a stream of level changes into debounced edges
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    debounce: Duration,
    stable: Option<Level>,
    candidate: Option<(Level, Instant)>,
}

impl EdgeDetector {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            stable: None,
            candidate: None,
        }
    }

    /// Last reported (or baseline) level
    pub fn stable(&self) -> Option<Level> {
        self.stable
    }

    /// Feed one observed level; returns it when an edge is confirmed at once
    ///
    /// The first observation only establishes the baseline. With a debounce,
    /// a new level becomes a candidate and is confirmed by [`settle`] once it
    /// has held until [`deadline`].
    ///
    /// [`settle`]: EdgeDetector::settle
    /// [`deadline`]: EdgeDetector::deadline
    pub fn sample(&mut self, level: Level, now: Instant) -> Option<Level> {
        let Some(stable) = self.stable else {
            self.stable = Some(level);
            return None;
        };

        if stable == level {
            self.candidate = None;
            return None;
        }

        if self.debounce.is_zero() {
            self.stable = Some(level);
            return Some(level);
        }

        match self.candidate {
            Some((candidate, _)) if candidate == level => {}
            _ => self.candidate = Some((level, now)),
        }
        self.settle(now)
    }

    /// When the pending candidate, if any, will have held long enough
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.map(|(_, since)| since + self.debounce)
    }

    /// Confirm the candidate if it has held for the debounce interval
    pub fn settle(&mut self, now: Instant) -> Option<Level> {
        let (level, since) = self.candidate?;
        if now.saturating_duration_since(since) < self.debounce {
            return None;
        }
        self.stable = Some(level);
        self.candidate = None;
        Some(level)
    }
}

/// Configuration for watching one input line
#[derive(Debug, Clone)]
pub struct EdgeWatcher {
    line: Line,
    debounce: Duration,
}

impl EdgeWatcher {
    /// Watch `line` with no debounce
    pub fn new(line: Line) -> Self {
        Self {
            line,
            debounce: Duration::ZERO,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn line(&self) -> Line {
        self.line
    }

    /// Subscribe now and forward edges from a task on the current runtime
    ///
    /// The subscription and baseline read happen before this returns, so no
    /// edge after the call is missed. Every edge (or the error that ends the
    /// subscription) is passed through `map` and sent on `tx`. The task ends
    /// when the edge stream ends, the receiver is dropped or the handle stopped.
    pub fn spawn<P, T, F>(self, port: P, tx: mpsc::Sender<T>, map: F) -> WatchHandle
    where
        P: GpioPort,
        T: Send + 'static,
        F: Fn(Result<Level>) -> T + Send + 'static,
    {
        let line = self.line;
        let subscription = port
            .edges(line)
            .and_then(|edges| Ok((edges, port.read(line)?)));

        let task = tokio::spawn(async move {
            let (mut edges, baseline) = match subscription {
                Ok(subscription) => subscription,
                Err(e) => {
                    tracing::error!("Failed to watch {}: {}", line, e);
                    let _ = tx.send(map(Err(e))).await;
                    return;
                }
            };

            tracing::debug!(
                "Watching {} from {} (debounce: {:?})",
                line,
                baseline,
                self.debounce
            );

            let mut detector = EdgeDetector::new(self.debounce);
            detector.sample(baseline, Instant::now());

            loop {
                let report = tokio::select! {
                    edge = edges.recv() => match edge {
                        Some(Ok(level)) => detector.sample(level, Instant::now()).map(Ok),
                        Some(Err(e)) => Some(Err(e)),
                        None => break,
                    },
                    _ = sleep_until(detector.deadline()) => {
                        detector.settle(Instant::now()).map(Ok)
                    }
                };

                if let Some(report) = report {
                    if let Ok(level) = &report {
                        tracing::debug!("Edge on {}: {}", line, level);
                    }
                    if tx.send(map(report)).await.is_err() {
                        tracing::debug!("Edge receiver for {} dropped", line);
                        break;
                    }
                }
            }

            tracing::debug!("Stopped watching {}", line);
        });

        WatchHandle { line, task }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle to a running edge watcher; stops it when dropped
#[derive(Debug)]
pub struct WatchHandle {
    line: Line,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn line(&self) -> Line {
        self.line
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

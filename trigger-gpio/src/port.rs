//! The port abstraction shared by the arbitrator and the edge watchers

use tokio::sync::mpsc;

use crate::error::{GpioError, Result};
use crate::line::{Level, Line};

/// Edges of one input line, as the level after each transition
///
/// An `Err` item means the line stopped reporting; the stream ends after it.
pub type EdgeStream = mpsc::UnboundedReceiver<Result<Level>>;

/// A set of digital lines that can be written, sampled and watched
///
/// Implementations must be cheap to clone; the arbitrator drives the outputs
/// through one clone while edge watchers subscribe through others.
/// Reads and writes are synchronous and expected to return quickly.
pub trait GpioPort: Clone + Send + Sync + 'static {
    /// Drive an output line to `level`
    fn write(&self, line: Line, level: Level) -> Result<()>;

    /// Sample the current level of a line (outputs read back their driven level)
    fn read(&self, line: Line) -> Result<Level>;

    /// Subscribe to the edges of an input line
    ///
    /// Every transition the hardware reports after this call is delivered,
    /// however short the pulse.
    fn edges(&self, line: Line) -> Result<EdgeStream>;

    /// Drive every output line to the same level
    ///
    /// Stops at the first failure; earlier lines stay written.
    fn write_outputs(&self, level: Level) -> Result<()> {
        for line in Line::OUTPUTS {
            self.write(line, level)?;
        }
        Ok(())
    }
}

/// Subscribers to the edges of one line
#[derive(Debug, Default)]
pub(crate) struct EdgeFanout {
    subscribers: Vec<mpsc::UnboundedSender<Result<Level>>>,
}

impl EdgeFanout {
    pub(crate) fn subscribe(&mut self) -> EdgeStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an edge to every live subscriber
    pub(crate) fn publish(&mut self, level: Level) {
        self.subscribers.retain(|tx| tx.send(Ok(level)).is_ok());
    }

    /// Deliver a terminal error and drop every subscriber
    pub(crate) fn fail(&mut self, make: impl Fn() -> GpioError) {
        for tx in self.subscribers.drain(..) {
            let _ = tx.send(Err(make()));
        }
    }
}

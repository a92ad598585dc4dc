//! Linux GPIO character device backend
//!
//! Claims the board's lines from a `/dev/gpiochipN` device. Outputs are held as
//! line handles; inputs are claimed for both-edge events, and one task per
//! input turns the kernel's interrupt-driven events into edges for every
//! subscriber. Offsets are chip-relative, so the pin map works whatever base
//! number the kernel gave the chip.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use gpio_cdev::{
    AsyncLineEventHandle, Chip, EventRequestFlags, EventType, LineHandle, LineRequestFlags,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{GpioError, Result};
use crate::line::{Level, Line, PinMap};
use crate::port::{EdgeFanout, EdgeStream, GpioPort};

/// Chip carrying the header pins on a Raspberry Pi
pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

const CONSUMER: &str = "dac-trigger";

#[derive(Debug)]
struct InputLine {
    /// Level after the most recent event
    level: Mutex<Level>,
    edges: Mutex<EdgeFanout>,
}

struct Inner {
    pins: PinMap,
    outputs: HashMap<Line, LineHandle>,
    inputs: HashMap<Line, Arc<InputLine>>,
    pumps: Vec<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for pump in &self.pumps {
            pump.abort();
        }
    }
}

/// GPIO port backed by the character device interface
///
/// Lines stay claimed until the last clone is dropped. Outputs are claimed
/// driving low.
#[derive(Clone)]
pub struct CdevGpio {
    inner: Arc<Inner>,
}

impl fmt::Debug for CdevGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevGpio")
            .field("pins", &self.inner.pins)
            .finish_non_exhaustive()
    }
}

impl CdevGpio {
    /// Open `chip` and claim every line; must run inside a tokio runtime
    pub fn open(chip: impl AsRef<Path>, pins: PinMap) -> Result<Self> {
        let path = chip.as_ref();
        let mut chip = Chip::new(path).map_err(|source| GpioError::Chip {
            path: path.to_path_buf(),
            source,
        })?;

        let mut outputs = HashMap::new();
        for line in Line::OUTPUTS {
            let offset = pins.pin(line);
            let handle = chip
                .get_line(offset)
                .and_then(|l| l.request(LineRequestFlags::OUTPUT, 0, CONSUMER))
                .map_err(|source| GpioError::Request {
                    line,
                    offset,
                    source,
                })?;
            outputs.insert(line, handle);
        }

        let mut inputs = HashMap::new();
        let mut pumps = Vec::new();
        for line in Line::INPUTS {
            let offset = pins.pin(line);
            let request_error = |source| GpioError::Request {
                line,
                offset,
                source,
            };
            let events = chip
                .get_line(offset)
                .and_then(|l| {
                    l.events(
                        LineRequestFlags::INPUT,
                        EventRequestFlags::BOTH_EDGES,
                        CONSUMER,
                    )
                })
                .map_err(request_error)?;
            let level = events
                .get_value()
                .map(Level::from_value)
                .map_err(|source| GpioError::Line { line, source })?;
            let events = AsyncLineEventHandle::new(events).map_err(request_error)?;

            let input = Arc::new(InputLine {
                level: Mutex::new(level),
                edges: Mutex::new(EdgeFanout::default()),
            });
            pumps.push(tokio::spawn(pump_events(line, events, Arc::clone(&input))));
            inputs.insert(line, input);

            tracing::debug!("Claimed {} at offset {} ({})", line, offset, level);
        }

        tracing::info!("Opened GPIO chip {}", path.display());

        Ok(Self {
            inner: Arc::new(Inner {
                pins,
                outputs,
                inputs,
                pumps,
            }),
        })
    }

    pub fn pins(&self) -> &PinMap {
        &self.inner.pins
    }

    fn input(&self, line: Line) -> Result<&InputLine> {
        self.inner
            .inputs
            .get(&line)
            .map(Arc::as_ref)
            .ok_or(GpioError::NotAnInput(line))
    }
}

impl GpioPort for CdevGpio {
    fn write(&self, line: Line, level: Level) -> Result<()> {
        let handle = self
            .inner
            .outputs
            .get(&line)
            .ok_or(GpioError::NotAnOutput(line))?;
        handle
            .set_value(level.as_value())
            .map_err(|source| GpioError::Line { line, source })
    }

    fn read(&self, line: Line) -> Result<Level> {
        if let Some(handle) = self.inner.outputs.get(&line) {
            return handle
                .get_value()
                .map(Level::from_value)
                .map_err(|source| GpioError::Line { line, source });
        }
        Ok(*self.input(line)?.level.lock())
    }

    fn edges(&self, line: Line) -> Result<EdgeStream> {
        Ok(self.input(line)?.edges.lock().subscribe())
    }
}

/// Level a line settles at after an event
fn level_after(event: EventType) -> Level {
    match event {
        EventType::RisingEdge => Level::High,
        EventType::FallingEdge => Level::Low,
    }
}

async fn pump_events(line: Line, mut events: AsyncLineEventHandle, input: Arc<InputLine>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                let level = level_after(event.event_type());
                *input.level.lock() = level;
                input.edges.lock().publish(level);
            }
            Err(e) => {
                tracing::error!("Edge events for {} failed: {}", line, e);
                let message = e.to_string();
                input.edges.lock().fail(|| GpioError::EdgeStream {
                    line,
                    message: message.clone(),
                });
                return;
            }
        }
    }

    tracing::warn!("Edge events for {} ended", line);
    input.edges.lock().fail(|| GpioError::EdgeStream {
        line,
        message: "event stream closed".to_string(),
    });
}

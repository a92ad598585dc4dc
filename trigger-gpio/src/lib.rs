//! # trigger-gpio
//!
//! Digital line plumbing for the DAC trigger board.
//!
//! The board carries five logical lines:
//!
//! | Line               | Direction | Purpose                                   |
//! |--------------------|-----------|-------------------------------------------|
//! | `DacEnable`        | out       | switches the DAC supply                   |
//! | `PowerGood`        | in        | feedback from the DAC supply              |
//! | `ExternalTrigger`  | in        | 12 V trigger from other equipment         |
//! | `TriggerOut1`/`2`  | out       | mirror DAC-Enable to downstream equipment |
//!
//! [`GpioPort`] is the seam the arbitrator drives. [`CdevGpio`] claims the
//! lines from a GPIO character device and receives edges as interrupts;
//! [`MockGpio`] simulates the board in tests. [`EdgeWatcher`] turns the edges
//! of an input line into debounced level changes.
//!
//! ```rust,ignore
//! use trigger_gpio::{CdevGpio, EdgeWatcher, Line, PinMap, DEFAULT_CHIP};
//!
//! let port = CdevGpio::open(DEFAULT_CHIP, PinMap::default())?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! let _watch = EdgeWatcher::new(Line::PowerGood).spawn(port.clone(), tx, |edge| edge);
//!
//! while let Some(edge) = rx.recv().await {
//!     println!("P_Good: {:?}", edge);
//! }
//! ```

pub mod cdev;
pub mod error;
pub mod line;
pub mod mock;
pub mod port;
pub mod watcher;

pub use cdev::{CdevGpio, DEFAULT_CHIP};
pub use error::{GpioError, Result};
pub use line::{Direction, Level, Line, PinMap};
pub use mock::MockGpio;
pub use port::{EdgeStream, GpioPort};
pub use watcher::{EdgeDetector, EdgeWatcher, WatchHandle};

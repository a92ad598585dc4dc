//! In-memory port for tests and bench runs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{GpioError, Result};
use crate::line::{Level, Line};
use crate::port::{EdgeFanout, EdgeStream, GpioPort};

#[derive(Debug, Default)]
struct MockState {
    levels: HashMap<Line, Level>,
    writes: Vec<(Line, Level)>,
    unavailable: HashSet<Line>,
    edges: HashMap<Line, EdgeFanout>,
    power_good_follows: bool,
}

impl MockState {
    /// Change a level, reporting an edge if it actually changed
    fn set(&mut self, line: Line, level: Level) {
        let previous = self.levels.insert(line, level).unwrap_or_default();
        if previous != level {
            if let Some(fanout) = self.edges.get_mut(&line) {
                fanout.publish(level);
            }
        }
    }
}

/// A simulated board
///
/// Clones share state, so a test can hold one handle while the arbitrator and
/// watchers use others. With [`MockGpio::following`], Power-Good mirrors every
/// DAC-Enable write the way a healthy DAC supply would. Every level change on
/// an input is delivered to edge subscribers, like an interrupt.
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    state: Arc<Mutex<MockState>>,
}

impl MockGpio {
    /// All lines low, Power-Good driven only by [`MockGpio::set_input`]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines low, Power-Good follows DAC-Enable
    pub fn following() -> Self {
        let port = Self::default();
        port.state.lock().power_good_follows = true;
        port
    }

    /// Force the level of any line, as external hardware would
    pub fn set_input(&self, line: Line, level: Level) {
        self.state.lock().set(line, level);
    }

    /// Make reads, writes and new subscriptions on `line` fail until cleared
    pub fn set_unavailable(&self, line: Line, unavailable: bool) {
        let mut state = self.state.lock();
        if unavailable {
            state.unavailable.insert(line);
        } else {
            state.unavailable.remove(&line);
        }
    }

    /// End every edge stream of `line` with an error, as a lost device would
    pub fn fail_edges(&self, line: Line) {
        if let Some(fanout) = self.state.lock().edges.get_mut(&line) {
            fanout.fail(|| GpioError::EdgeStream {
                line,
                message: "simulated fault".to_string(),
            });
        }
    }

    /// Current level of a line
    pub fn level(&self, line: Line) -> Level {
        self.state.lock().levels.get(&line).copied().unwrap_or_default()
    }

    /// Every write performed, in order
    pub fn writes(&self) -> Vec<(Line, Level)> {
        self.state.lock().writes.clone()
    }

    /// Writes to a single line, in order
    pub fn writes_to(&self, line: Line) -> Vec<Level> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(l, _)| *l == line)
            .map(|(_, level)| *level)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }
}

impl GpioPort for MockGpio {
    fn write(&self, line: Line, level: Level) -> Result<()> {
        if !line.is_output() {
            return Err(GpioError::NotAnOutput(line));
        }
        let mut state = self.state.lock();
        if state.unavailable.contains(&line) {
            return Err(GpioError::Unavailable(line));
        }
        state.set(line, level);
        state.writes.push((line, level));
        if line == Line::DacEnable && state.power_good_follows {
            state.set(Line::PowerGood, level);
        }
        Ok(())
    }

    fn read(&self, line: Line) -> Result<Level> {
        let state = self.state.lock();
        if state.unavailable.contains(&line) {
            return Err(GpioError::Unavailable(line));
        }
        Ok(state.levels.get(&line).copied().unwrap_or_default())
    }

    fn edges(&self, line: Line) -> Result<EdgeStream> {
        if line.is_output() {
            return Err(GpioError::NotAnInput(line));
        }
        let mut state = self.state.lock();
        if state.unavailable.contains(&line) {
            return Err(GpioError::Unavailable(line));
        }
        Ok(state.edges.entry(line).or_default().subscribe())
    }
}

//! Logical lines and levels

use std::fmt;

/// Binary level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Raw line value as used by the character device
    pub fn as_value(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }

    /// Any non-zero value reads as high
    pub fn from_value(value: u8) -> Self {
        Level::from(value != 0)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_value())
    }
}

/// Direction of a line as configured on the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// The logical lines of the DAC trigger board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Switches DAC power (P_On)
    DacEnable,
    /// Feedback from the DAC power supply (P_Good)
    PowerGood,
    /// Trigger input from external equipment (Trig_In)
    ExternalTrigger,
    /// First trigger mirror output (Trig_Out_1)
    TriggerOut1,
    /// Second trigger mirror output (Trig_Out_2)
    TriggerOut2,
}

impl Line {
    /// Every line on the board
    pub const ALL: [Line; 5] = [
        Line::DacEnable,
        Line::PowerGood,
        Line::ExternalTrigger,
        Line::TriggerOut1,
        Line::TriggerOut2,
    ];

    /// Lines that are written together on every power decision
    pub const OUTPUTS: [Line; 3] = [Line::DacEnable, Line::TriggerOut1, Line::TriggerOut2];

    /// Lines that report edges
    pub const INPUTS: [Line; 2] = [Line::PowerGood, Line::ExternalTrigger];

    pub fn direction(self) -> Direction {
        match self {
            Line::PowerGood | Line::ExternalTrigger => Direction::In,
            Line::DacEnable | Line::TriggerOut1 | Line::TriggerOut2 => Direction::Out,
        }
    }

    pub fn is_output(self) -> bool {
        self.direction() == Direction::Out
    }

    /// Board label of the line
    pub fn label(self) -> &'static str {
        match self {
            Line::DacEnable => "P_On",
            Line::PowerGood => "P_Good",
            Line::ExternalTrigger => "Trig_In",
            Line::TriggerOut1 => "Trig_Out_1",
            Line::TriggerOut2 => "Trig_Out_2",
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Line offset on the GPIO chip for each logical line
///
/// On a Raspberry Pi the offsets on `gpiochip0` are the BCM numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub dac_enable: u32,
    pub power_good: u32,
    pub external_trigger: u32,
    pub trigger_out_1: u32,
    pub trigger_out_2: u32,
}

impl PinMap {
    pub fn pin(&self, line: Line) -> u32 {
        match line {
            Line::DacEnable => self.dac_enable,
            Line::PowerGood => self.power_good,
            Line::ExternalTrigger => self.external_trigger,
            Line::TriggerOut1 => self.trigger_out_1,
            Line::TriggerOut2 => self.trigger_out_2,
        }
    }

    /// Returns the first line that shares a pin with another line, if any
    pub fn find_conflict(&self) -> Option<(Line, Line)> {
        for (i, a) in Line::ALL.iter().enumerate() {
            for b in &Line::ALL[i + 1..] {
                if self.pin(*a) == self.pin(*b) {
                    return Some((*a, *b));
                }
            }
        }
        None
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            dac_enable: 23,
            power_good: 22,
            external_trigger: 16,
            trigger_out_1: 6,
            trigger_out_2: 13,
        }
    }
}

//! Error types for the trigger-gpio crate.

use std::path::PathBuf;

use crate::line::Line;

/// Errors that can occur while driving or sampling digital lines.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    /// The GPIO character device could not be opened
    #[error("Failed to open GPIO chip {}: {source}", path.display())]
    Chip {
        path: PathBuf,
        #[source]
        source: gpio_cdev::Error,
    },

    /// Claiming a line from the chip failed (already in use, bad offset)
    #[error("Failed to request {line} (offset {offset}): {source}")]
    Request {
        line: Line,
        offset: u32,
        #[source]
        source: gpio_cdev::Error,
    },

    /// Reading or writing a claimed line failed
    #[error("I/O error on {line}: {source}")]
    Line {
        line: Line,
        #[source]
        source: gpio_cdev::Error,
    },

    /// The kernel stopped delivering edge events for a line
    #[error("Edge events for {line} stopped: {message}")]
    EdgeStream { line: Line, message: String },

    /// A write was attempted on an input line
    #[error("{0} is not an output line")]
    NotAnOutput(Line),

    /// Edges were requested for an output line
    #[error("{0} does not report edges")]
    NotAnInput(Line),

    /// The line is unavailable (simulated faults, unplugged hardware)
    #[error("{0} is unavailable")]
    Unavailable(Line),
}

/// Convenience type alias for Results using GpioError.
pub type Result<T> = std::result::Result<T, GpioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_error_display() {
        let error = GpioError::NotAnOutput(Line::PowerGood);
        assert_eq!(error.to_string(), "P_Good is not an output line");

        let error = GpioError::EdgeStream {
            line: Line::ExternalTrigger,
            message: "device removed".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Edge events for Trig_In stopped: device removed"
        );

        let error = GpioError::Unavailable(Line::DacEnable);
        assert_eq!(error.to_string(), "P_On is unavailable");
    }
}

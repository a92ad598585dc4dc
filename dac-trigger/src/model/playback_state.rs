//! Playback state enumeration

use serde::{Deserialize, Serialize};

/// Normalized playback state of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Currently playing audio
    Playing,
    /// Buffering before playback starts
    Loading,
    /// Playback is paused
    Paused,
    /// Playback is stopped
    Stopped,
    /// Any state this crate does not act on
    #[default]
    Other,
}

/// What a playback state asks of the DAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDemand {
    On,
    Off,
    /// No decision; the DAC stays as it is
    Keep,
}

impl PlaybackState {
    /// Parse from a zone state string
    ///
    /// Handles `"playing"`, `"loading"`, `"paused"` and `"stopped"` in any case;
    /// everything else maps to `Other`.
    pub fn from_zone_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "loading" => PlaybackState::Loading,
            "paused" => PlaybackState::Paused,
            "stopped" => PlaybackState::Stopped,
            _ => PlaybackState::Other,
        }
    }

    pub fn power_demand(self) -> PowerDemand {
        match self {
            PlaybackState::Playing | PlaybackState::Loading => PowerDemand::On,
            PlaybackState::Stopped => PowerDemand::Off,
            PlaybackState::Paused | PlaybackState::Other => PowerDemand::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("playing", PlaybackState::Playing)]
    #[case("PLAYING", PlaybackState::Playing)]
    #[case("loading", PlaybackState::Loading)]
    #[case("paused", PlaybackState::Paused)]
    #[case("stopped", PlaybackState::Stopped)]
    #[case("", PlaybackState::Other)]
    #[case("seeking", PlaybackState::Other)]
    fn test_from_zone_state(#[case] raw: &str, #[case] expected: PlaybackState) {
        assert_eq!(PlaybackState::from_zone_state(raw), expected);
    }

    #[test]
    fn test_power_demand() {
        assert_eq!(PlaybackState::Playing.power_demand(), PowerDemand::On);
        assert_eq!(PlaybackState::Loading.power_demand(), PowerDemand::On);
        assert_eq!(PlaybackState::Stopped.power_demand(), PowerDemand::Off);
        assert_eq!(PlaybackState::Paused.power_demand(), PowerDemand::Keep);
        assert_eq!(PlaybackState::Other.power_demand(), PowerDemand::Keep);
    }
}

//! Configuration surface description
//!
//! A layout lists the fields a settings UI should render for a given set of
//! values, with a per-field error for anything out of range. A save is valid
//! exactly when the layout has no errors.

use serde::Serialize;

use super::{Delay, Settings, TURN_OFF_PAUSE_RANGE, TURN_ON_PAUSE_RANGE};

/// Widget kind for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Zone,
    Integer,
}

/// One rendered field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<&'static str>,
    /// Key of the value in the settings record
    pub setting: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Values plus the fields that describe them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsLayout {
    pub values: Settings,
    pub layout: Vec<LayoutField>,
    pub has_error: bool,
}

impl SettingsLayout {
    pub fn for_settings(settings: &Settings) -> Self {
        let mut layout = vec![LayoutField {
            kind: FieldKind::Zone,
            title: "Zone",
            subtitle: None,
            setting: "zone",
            min: None,
            max: None,
            error: None,
        }];

        if let Some(field) = delay_field(
            settings.turn_on_pause,
            "turnOnPause",
            "Turn On Delay (seconds)",
            "Delay between pressing play and playback starting, while the DAC powers up.",
            "Turn On Delay",
            TURN_ON_PAUSE_RANGE.start(),
            TURN_ON_PAUSE_RANGE.end(),
        ) {
            layout.push(field);
        }

        if let Some(field) = delay_field(
            settings.turn_off_pause,
            "turnOffPause",
            "Turn Off Delay (seconds)",
            "Delay between pressing stop and the DAC being powered down.",
            "Turn Off Delay",
            TURN_OFF_PAUSE_RANGE.start(),
            TURN_OFF_PAUSE_RANGE.end(),
        ) {
            layout.push(field);
        }

        let has_error = layout.iter().any(|f| f.error.is_some());

        Self {
            values: settings.clone(),
            layout,
            has_error,
        }
    }

    /// Error messages of every invalid field
    pub fn errors(&self) -> Vec<&str> {
        self.layout
            .iter()
            .filter_map(|f| f.error.as_deref())
            .collect()
    }
}

fn delay_field(
    delay: Delay,
    setting: &'static str,
    title: &'static str,
    subtitle: &'static str,
    label: &str,
    min: &i64,
    max: &i64,
) -> Option<LayoutField> {
    let Delay::Seconds(value) = delay else {
        return None;
    };

    let error = (value < *min || value > *max)
        .then(|| format!("{} must be between {} and {} seconds.", label, min, max));

    Some(LayoutField {
        kind: FieldKind::Integer,
        title,
        subtitle: Some(subtitle),
        setting,
        min: Some(*min),
        max: Some(*max),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_has_three_fields() {
        let layout = Settings::default().layout();
        let keys: Vec<_> = layout.layout.iter().map(|f| f.setting).collect();
        assert_eq!(keys, vec!["zone", "turnOnPause", "turnOffPause"]);
        assert!(!layout.has_error);
    }

    #[test]
    fn test_out_of_range_marks_field() {
        let layout = Settings::default().with_turn_on_pause(25).layout();
        assert!(layout.has_error);
        assert_eq!(
            layout.errors(),
            vec!["Turn On Delay must be between 1 and 20 seconds."]
        );
    }

    #[test]
    fn test_disabled_delay_is_hidden() {
        let settings = Settings {
            turn_on_pause: Delay::Disabled,
            ..Default::default()
        };
        let layout = settings.layout();
        assert!(layout.layout.iter().all(|f| f.setting != "turnOnPause"));
    }

    #[test]
    fn test_serializes_like_the_surface() {
        let layout = Settings::default().with_turn_off_pause(4000).layout();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["has_error"], true);
        assert_eq!(json["layout"][2]["type"], "integer");
        assert_eq!(json["layout"][2]["max"], 3600);
        assert_eq!(json["values"]["turnOffPause"], 4000);
    }
}

//! Wire types for the gadget channel.
//!
//! Inbound [`Directive`]s arrive as JSON strings over the D-Bus `dispatch`
//! method; outbound [`GadgetEvent`]s leave as `(name, payload)` pairs on the
//! `gadget_event` signal. Both sides are versioned only by their field
//! shapes, so unknown directive types decode to [`Directive::Unknown`] and
//! are ignored instead of failing the whole channel.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ControlError;

/// An inbound control request, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Directive {
    /// Ask for a spoken air-quality report.
    AirQuality,
    /// Ask for a spoken temperature report in the given unit.
    Temperature { unit: String },
    /// Set the fan to an explicit speed percentage.
    Speed { speed: i32 },
    /// Turn automation mode on or off ("on" enables, anything else disables).
    Auto { command: String },
    /// Any directive type this build does not know. Silently dropped.
    #[serde(other)]
    Unknown,
}

impl Directive {
    /// Parses a raw JSON payload into a directive.
    ///
    /// Unknown `type` values succeed as [`Directive::Unknown`]; only
    /// syntactically broken JSON or a known type with missing fields is an
    /// error.
    pub fn parse(payload: &str) -> Result<Self, ControlError> {
        serde_json::from_str(payload)
            .map_err(|e| ControlError::MalformedDirective(e.to_string()))
    }
}

/// An outbound notification for the voice front end.
#[derive(Debug, Clone, PartialEq)]
pub enum GadgetEvent {
    FanSpeed {
        speech: String,
    },
    AirQuality {
        /// 1 asks the front end to confirm before acting, 0 is informational.
        request: u8,
        speech: String,
    },
    Filter {
        speech: String,
    },
    Temperature {
        speech: String,
    },
}

impl GadgetEvent {
    /// Stable event name carried next to the payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FanSpeed { .. } => "FanSpeed",
            Self::AirQuality { .. } => "AirQuality",
            Self::Filter { .. } => "Filter",
            Self::Temperature { .. } => "Temperature",
        }
    }

    /// JSON payload for the event.
    pub fn payload(&self) -> Value {
        match self {
            Self::FanSpeed { speech } => json!({ "speech": speech }),
            Self::AirQuality { request, speech } => {
                json!({ "request": request, "speech": speech })
            }
            Self::Filter { speech } => json!({ "speech": speech }),
            Self::Temperature { speech } => json!({ "speech": speech }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_airquality() {
        let d = Directive::parse(r#"{"type": "airquality"}"#).unwrap();
        assert_eq!(d, Directive::AirQuality);
    }

    #[test]
    fn parses_temperature_with_unit() {
        let d = Directive::parse(r#"{"type": "temperature", "unit": "fahrenheit"}"#).unwrap();
        assert_eq!(
            d,
            Directive::Temperature {
                unit: "fahrenheit".into()
            }
        );
    }

    #[test]
    fn parses_speed() {
        let d = Directive::parse(r#"{"type": "speed", "speed": 60}"#).unwrap();
        assert_eq!(d, Directive::Speed { speed: 60 });
    }

    #[test]
    fn parses_auto() {
        let d = Directive::parse(r#"{"type": "auto", "command": "off"}"#).unwrap();
        assert_eq!(
            d,
            Directive::Auto {
                command: "off".into()
            }
        );
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let d = Directive::parse(r#"{"type": "discomode", "intensity": 11}"#).unwrap();
        assert_eq!(d, Directive::Unknown);
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = Directive::parse("{nope").unwrap_err();
        assert!(matches!(err, ControlError::MalformedDirective(_)));
    }

    #[test]
    fn known_type_with_missing_field_is_malformed() {
        let err = Directive::parse(r#"{"type": "speed"}"#).unwrap_err();
        assert!(matches!(err, ControlError::MalformedDirective(_)));
    }

    #[test]
    fn event_names_and_payloads() {
        let ev = GadgetEvent::AirQuality {
            request: 1,
            speech: "Pollution detected.".into(),
        };
        assert_eq!(ev.name(), "AirQuality");
        assert_eq!(
            ev.payload(),
            serde_json::json!({ "request": 1, "speech": "Pollution detected." })
        );

        let ev = GadgetEvent::FanSpeed {
            speech: "set to low".into(),
        };
        assert_eq!(ev.name(), "FanSpeed");
        assert_eq!(ev.payload()["speech"], "set to low");
    }
}

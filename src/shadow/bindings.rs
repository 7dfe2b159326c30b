//! Shadow property registry
//!
//! Maps every recognized property name to what it controls or reports.
//! Names not in [`BINDINGS`] are echoed back untouched.

use crate::peripherals::{
    int_to_rgb, rgb_to_int, Actuator, ActuatorCommand, Axis, BackLedMode, LedAnimation,
    Peripherals, Reading, Rgb, Sensor,
};
use serde_json::{Number, Value};
use thiserror::Error;

/// Synchronizer-level settings reachable through the shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFlag {
    /// Fast periodic reports with command echo silenced
    HighUpdateRate,
}

/// Where a reported value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Sensor(Sensor),
    /// The URL currently shared on the NFC tag and QR code
    SharedUrl,
}

/// What a property name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Drives an actuator
    Setter(Actuator),
    /// Drives an actuator and echoes extra read-back properties
    CompositeSetter(Actuator),
    /// Reported-only; desired values have no local effect
    Getter(Source),
    /// Pass-through configuration flag
    Config(ConfigFlag),
}

/// Property name registry
pub static BINDINGS: &[(&str, Binding)] = &[
    ("display_brightness", Binding::Setter(Actuator::DisplayBrightness)),
    ("led_brightness", Binding::Setter(Actuator::LedBrightness)),
    ("led_animation", Binding::CompositeSetter(Actuator::LedAnimation)),
    ("led_1", Binding::Setter(Actuator::Led(0))),
    ("led_2", Binding::Setter(Actuator::Led(1))),
    ("led_3", Binding::Setter(Actuator::Led(2))),
    ("led_4", Binding::Setter(Actuator::Led(3))),
    ("led_5", Binding::Setter(Actuator::Led(4))),
    ("back_led", Binding::Setter(Actuator::BackLed)),
    ("shared_url", Binding::Setter(Actuator::SharedUrl)),
    ("high_update_rate", Binding::Config(ConfigFlag::HighUpdateRate)),
    ("temperature", Binding::Getter(Source::Sensor(Sensor::Temperature))),
    ("humidity", Binding::Getter(Source::Sensor(Sensor::Humidity))),
    ("ambient_light", Binding::Getter(Source::Sensor(Sensor::AmbientLight))),
    ("acceleration_x", Binding::Getter(Source::Sensor(Sensor::Acceleration(Axis::X)))),
    ("acceleration_y", Binding::Getter(Source::Sensor(Sensor::Acceleration(Axis::Y)))),
    ("acceleration_z", Binding::Getter(Source::Sensor(Sensor::Acceleration(Axis::Z)))),
    ("button_1", Binding::Getter(Source::Sensor(Sensor::Button(0)))),
    ("button_2", Binding::Getter(Source::Sensor(Sensor::Button(1)))),
    ("button_3", Binding::Getter(Source::Sensor(Sensor::Button(2)))),
];

/// Properties sampled by the periodic report, in publish order
pub static REPORTED: &[(&str, Source)] = &[
    ("temperature", Source::Sensor(Sensor::Temperature)),
    ("humidity", Source::Sensor(Sensor::Humidity)),
    ("ambient_light", Source::Sensor(Sensor::AmbientLight)),
    ("acceleration_x", Source::Sensor(Sensor::Acceleration(Axis::X))),
    ("acceleration_y", Source::Sensor(Sensor::Acceleration(Axis::Y))),
    ("acceleration_z", Source::Sensor(Sensor::Acceleration(Axis::Z))),
    ("button_1", Source::Sensor(Sensor::Button(0))),
    ("button_2", Source::Sensor(Sensor::Button(1))),
    ("button_3", Source::Sensor(Sensor::Button(2))),
    ("led_1", Source::Sensor(Sensor::Led(0))),
    ("led_2", Source::Sensor(Sensor::Led(1))),
    ("led_3", Source::Sensor(Sensor::Led(2))),
    ("led_4", Source::Sensor(Sensor::Led(3))),
    ("led_5", Source::Sensor(Sensor::Led(4))),
    ("shared_url", Source::SharedUrl),
];

/// Front LED colors echoed after switching to the static animation
static LED_READBACK: &[(&str, Source)] = &[
    ("led_1", Source::Sensor(Sensor::Led(0))),
    ("led_2", Source::Sensor(Sensor::Led(1))),
    ("led_3", Source::Sensor(Sensor::Led(2))),
    ("led_4", Source::Sensor(Sensor::Led(3))),
    ("led_5", Source::Sensor(Sensor::Led(4))),
];

/// Find the binding for a property name
pub fn lookup(name: &str) -> Option<Binding> {
    BINDINGS
        .iter()
        .find(|(property, _)| *property == name)
        .map(|(_, binding)| *binding)
}

/// Desired value that cannot drive its actuator
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, got {value}")]
pub struct CoercionError {
    pub expected: &'static str,
    pub value: Value,
}

impl CoercionError {
    fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            value: value.clone(),
        }
    }
}

fn raw_percent(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|p| p.is_finite())
}

/// Percentage (number or numeric string) scaled to 0.0..=1.0
fn percent(value: &Value) -> Result<f32, CoercionError> {
    raw_percent(value)
        .map(|p| (p / 100.0).clamp(0.0, 1.0) as f32)
        .ok_or_else(|| CoercionError::new("a percentage", value))
}

/// `0xRRGGBB` integer or `[r, g, b]`
fn color(value: &Value) -> Result<Rgb, CoercionError> {
    let invalid = || CoercionError::new("an RGB integer or [r, g, b]", value);
    match value {
        Value::Number(n) => n
            .as_u64()
            .filter(|v| *v <= 0xff_ffff)
            .map(|v| int_to_rgb(v as u32))
            .ok_or_else(invalid),
        Value::Array(items) if items.len() == 3 => {
            let mut rgb = [0u8; 3];
            for (channel, item) in rgb.iter_mut().zip(items) {
                *channel = item
                    .as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(invalid)?;
            }
            Ok(rgb)
        }
        _ => Err(invalid()),
    }
}

fn text<'a>(value: &'a Value, expected: &'static str) -> Result<&'a str, CoercionError> {
    value
        .as_str()
        .ok_or_else(|| CoercionError::new(expected, value))
}

/// Convert a desired value into a command for `actuator`
pub fn coerce(actuator: Actuator, value: &Value) -> Result<ActuatorCommand, CoercionError> {
    let command = match actuator {
        Actuator::DisplayBrightness => ActuatorCommand::DisplayBrightness(percent(value)?),
        Actuator::LedBrightness => ActuatorCommand::LedBrightness(percent(value)?),
        Actuator::LedAnimation => {
            let name = text(value, "an animation name")?;
            let animation = name
                .parse::<LedAnimation>()
                .map_err(|_| CoercionError::new("an animation name", value))?;
            ActuatorCommand::LedAnimation(animation)
        }
        Actuator::Led(index) => ActuatorCommand::Led {
            index,
            color: color(value)?,
        },
        Actuator::BackLed => {
            let mode = text(value, "on, off or blinking")?
                .parse::<BackLedMode>()
                .map_err(|_| CoercionError::new("on, off or blinking", value))?;
            ActuatorCommand::BackLed(mode)
        }
        Actuator::SharedUrl => {
            let url = text(value, "a URL")?.trim();
            if url.is_empty() {
                return Err(CoercionError::new("a URL", value));
            }
            ActuatorCommand::ShareUrl(url.to_string())
        }
    };
    Ok(command)
}

/// Value reported once `value` has been applied to `actuator`
///
/// Percentages outside 0..=100 report the bound they were clamped to. Other
/// accepted values are echoed as received.
pub fn effective_value(actuator: Actuator, value: &Value) -> Value {
    match actuator {
        Actuator::DisplayBrightness | Actuator::LedBrightness => match raw_percent(value) {
            Some(p) if p > 100.0 => Value::from(100),
            Some(p) if p < 0.0 => Value::from(0),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Extra properties to echo after a composite command
pub fn readback(command: &ActuatorCommand) -> &'static [(&'static str, Source)] {
    match command {
        ActuatorCommand::LedAnimation(LedAnimation::Static) => LED_READBACK,
        _ => &[],
    }
}

/// Truthiness of a configuration flag value
///
/// `false`, `null`, zero, empty strings and the strings "0", "false" and
/// "off" are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false" | "off"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Convert a sensor reading into its shadow representation
pub fn reading_value(reading: Reading) -> Option<Value> {
    match reading {
        Reading::Number(v) => Number::from_f64(v).map(Value::Number),
        Reading::Pressed(true) => Some(Value::from("pressed")),
        Reading::Pressed(false) => Some(Value::from("not pressed")),
        Reading::Color(rgb) => Some(Value::from(rgb_to_int(rgb))),
    }
}

/// Sample a source; `None` when the collaborator has no value
pub fn sample(source: Source, peripherals: &mut dyn Peripherals, shared_url: &str) -> Option<Value> {
    match source {
        Source::Sensor(sensor) => peripherals.read(sensor).and_then(reading_value),
        Source::SharedUrl => Some(Value::from(shared_url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::SimulatedBadge;
    use serde_json::json;

    #[test]
    fn test_lookup() {
        assert_eq!(
            lookup("display_brightness"),
            Some(Binding::Setter(Actuator::DisplayBrightness))
        );
        assert_eq!(
            lookup("led_animation"),
            Some(Binding::CompositeSetter(Actuator::LedAnimation))
        );
        assert_eq!(
            lookup("high_update_rate"),
            Some(Binding::Config(ConfigFlag::HighUpdateRate))
        );
        assert!(matches!(lookup("temperature"), Some(Binding::Getter(_))));
        assert_eq!(lookup("firmware_color"), None);
    }

    #[test]
    fn test_reported_names_are_bound() {
        for (name, _) in REPORTED {
            assert!(lookup(name).is_some(), "{name} has no binding");
        }
    }

    #[test]
    fn test_brightness_scaling() {
        assert_eq!(
            coerce(Actuator::LedBrightness, &json!("50")),
            Ok(ActuatorCommand::LedBrightness(0.5))
        );
        assert_eq!(
            coerce(Actuator::DisplayBrightness, &json!(50)),
            Ok(ActuatorCommand::DisplayBrightness(0.5))
        );
        assert_eq!(
            coerce(Actuator::DisplayBrightness, &json!(250)),
            Ok(ActuatorCommand::DisplayBrightness(1.0))
        );
        assert!(coerce(Actuator::LedBrightness, &json!("bright")).is_err());
    }

    #[test]
    fn test_effective_value_reports_clamp() {
        assert_eq!(
            effective_value(Actuator::LedBrightness, &json!("50")),
            json!("50")
        );
        assert_eq!(
            effective_value(Actuator::DisplayBrightness, &json!(250)),
            json!(100)
        );
        assert_eq!(
            effective_value(Actuator::DisplayBrightness, &json!("-5")),
            json!(0)
        );
        assert_eq!(effective_value(Actuator::BackLed, &json!("on")), json!("on"));
    }

    #[test]
    fn test_led_colors() {
        assert_eq!(
            coerce(Actuator::Led(1), &json!(0xff9900)),
            Ok(ActuatorCommand::Led {
                index: 1,
                color: [0xff, 0x99, 0x00]
            })
        );
        assert_eq!(
            coerce(Actuator::Led(0), &json!([1, 2, 3])),
            Ok(ActuatorCommand::Led {
                index: 0,
                color: [1, 2, 3]
            })
        );
        assert!(coerce(Actuator::Led(0), &json!([1, 2, 300])).is_err());
        assert!(coerce(Actuator::Led(0), &json!(0x1000000)).is_err());
    }

    #[test]
    fn test_named_values() {
        assert_eq!(
            coerce(Actuator::LedAnimation, &json!("Rainbow")),
            Ok(ActuatorCommand::LedAnimation(LedAnimation::Rainbow))
        );
        assert_eq!(
            coerce(Actuator::BackLed, &json!("on")),
            Ok(ActuatorCommand::BackLed(BackLedMode::On))
        );
        assert!(coerce(Actuator::BackLed, &json!(true)).is_err());
        assert!(coerce(Actuator::SharedUrl, &json!("  ")).is_err());
    }

    #[test]
    fn test_static_readback() {
        assert_eq!(
            readback(&ActuatorCommand::LedAnimation(LedAnimation::Static)).len(),
            5
        );
        assert!(readback(&ActuatorCommand::LedAnimation(LedAnimation::Comet)).is_empty());
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&Value::Null));
    }

    #[test]
    fn test_sample_values() {
        let mut badge = SimulatedBadge::new();
        badge.buttons[1] = true;
        badge.leds[0] = [0, 0, 255];

        assert_eq!(
            sample(Source::Sensor(Sensor::Button(1)), &mut badge, ""),
            Some(json!("pressed"))
        );
        assert_eq!(
            sample(Source::Sensor(Sensor::Button(0)), &mut badge, ""),
            Some(json!("not pressed"))
        );
        assert_eq!(
            sample(Source::Sensor(Sensor::Led(0)), &mut badge, ""),
            Some(json!(255))
        );
        assert_eq!(
            sample(Source::SharedUrl, &mut badge, "https://example.com"),
            Some(json!("https://example.com"))
        );
    }
}

//! Badge hardware collaborators
//!
//! The shadow synchronizer drives actuators and samples sensors through the
//! [`Peripherals`] trait. Implementations absorb their own driver failures:
//! a command that cannot be applied is simply not applied, and a sensor that
//! cannot be read returns `None`.

pub mod simulated;

pub use simulated::SimulatedBadge;

use std::fmt;
use std::str::FromStr;

/// Number of front RGB LEDs
pub const LED_COUNT: usize = 5;

/// Number of user buttons
pub const BUTTON_COUNT: usize = 3;

/// 8-bit RGB color
pub type Rgb = [u8; 3];

/// Pack an RGB color as `0xRRGGBB`
pub fn rgb_to_int(rgb: Rgb) -> u32 {
    (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}

/// Unpack `0xRRGGBB`
pub fn int_to_rgb(value: u32) -> Rgb {
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

/// Front LED animations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedAnimation {
    /// No animation; LEDs hold their individually set colors
    Static,
    Blink,
    SparklePulse,
    Comet,
    Chase,
    Pulse,
    Sparkle,
    RainbowChase,
    RainbowSparkle,
    RainbowComet,
    ColorCycle,
    Rainbow,
}

impl LedAnimation {
    pub const ALL: [LedAnimation; 12] = [
        LedAnimation::Static,
        LedAnimation::Blink,
        LedAnimation::SparklePulse,
        LedAnimation::Comet,
        LedAnimation::Chase,
        LedAnimation::Pulse,
        LedAnimation::Sparkle,
        LedAnimation::RainbowChase,
        LedAnimation::RainbowSparkle,
        LedAnimation::RainbowComet,
        LedAnimation::ColorCycle,
        LedAnimation::Rainbow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LedAnimation::Static => "Static",
            LedAnimation::Blink => "Blink",
            LedAnimation::SparklePulse => "SparklePulse",
            LedAnimation::Comet => "Comet",
            LedAnimation::Chase => "Chase",
            LedAnimation::Pulse => "Pulse",
            LedAnimation::Sparkle => "Sparkle",
            LedAnimation::RainbowChase => "RainbowChase",
            LedAnimation::RainbowSparkle => "RainbowSparkle",
            LedAnimation::RainbowComet => "RainbowComet",
            LedAnimation::ColorCycle => "ColorCycle",
            LedAnimation::Rainbow => "Rainbow",
        }
    }
}

impl FromStr for LedAnimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedAnimation::ALL
            .into_iter()
            .find(|animation| animation.name() == s)
            .ok_or_else(|| format!("unknown LED animation {s:?}"))
    }
}

impl fmt::Display for LedAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rear LED modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackLedMode {
    On,
    Off,
    Blinking,
}

impl FromStr for BackLedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(BackLedMode::On),
            "off" => Ok(BackLedMode::Off),
            "blinking" => Ok(BackLedMode::Blinking),
            other => Err(format!("unknown back LED mode {other:?}")),
        }
    }
}

/// Actuator targets addressable by shadow properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuator {
    DisplayBrightness,
    LedBrightness,
    LedAnimation,
    /// Front LED by zero-based index
    Led(usize),
    BackLed,
    /// NFC tag contents and the on-screen QR code
    SharedUrl,
}

/// A coerced actuator command
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    /// 0.0..=1.0
    DisplayBrightness(f32),
    /// 0.0..=1.0
    LedBrightness(f32),
    LedAnimation(LedAnimation),
    Led { index: usize, color: Rgb },
    BackLed(BackLedMode),
    /// Write the URL to the NFC tag and render it as a QR code
    ShareUrl(String),
}

/// Accelerometer axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Readable badge inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Degrees Celsius
    Temperature,
    /// Relative humidity in percent
    Humidity,
    AmbientLight,
    /// m/s^2
    Acceleration(Axis),
    /// Zero-based button index
    Button(usize),
    /// Current color of a front LED
    Led(usize),
}

/// A sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Number(f64),
    Pressed(bool),
    Color(Rgb),
}

/// Badge hardware as seen by the synchronizer
pub trait Peripherals: Send {
    /// Apply an actuator command
    fn apply(&mut self, command: &ActuatorCommand);

    /// Sample a sensor; `None` when unavailable
    fn read(&mut self, sensor: Sensor) -> Option<Reading>;

    /// Next debounced button press (zero-based index), if any
    fn poll_button_press(&mut self) -> Option<usize>;

    /// Advance animations and input debouncers
    fn update(&mut self);
}

//! In-memory badge
//!
//! Keeps actuator state and serves settable sensor values so the controller
//! runs without hardware drivers.

use super::{
    ActuatorCommand, Axis, BackLedMode, LedAnimation, Peripherals, Reading, Rgb, Sensor,
    BUTTON_COUNT, LED_COUNT,
};
use std::collections::VecDeque;
use tracing::info;

/// Default LED color (AWS orange)
const DEFAULT_COLOR: Rgb = [0xff, 0x99, 0x00];

/// Simulated badge hardware
#[derive(Debug, Clone)]
pub struct SimulatedBadge {
    pub display_brightness: f32,
    pub led_brightness: f32,
    pub animation: LedAnimation,
    pub leds: [Rgb; LED_COUNT],
    pub back_led: BackLedMode,
    pub shared_url: Option<String>,
    pub temperature: f64,
    pub humidity: f64,
    pub ambient_light: f64,
    pub acceleration: [f64; 3],
    pub buttons: [bool; BUTTON_COUNT],
    presses: VecDeque<usize>,
    frame: u32,
}

impl Default for SimulatedBadge {
    fn default() -> Self {
        Self {
            display_brightness: 1.0,
            led_brightness: 0.3,
            animation: LedAnimation::Static,
            leds: [DEFAULT_COLOR; LED_COUNT],
            back_led: BackLedMode::Off,
            shared_url: None,
            temperature: 22.0,
            humidity: 40.0,
            ambient_light: 1200.0,
            acceleration: [0.0, 0.0, 9.81],
            buttons: [false; BUTTON_COUNT],
            presses: VecDeque::new(),
            frame: 0,
        }
    }
}

impl SimulatedBadge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a button press for the controller to pick up
    pub fn press(&mut self, button: usize) {
        if button < BUTTON_COUNT {
            self.presses.push_back(button);
        }
    }

    fn animate(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        match self.animation {
            LedAnimation::Static => {}
            LedAnimation::Chase | LedAnimation::RainbowChase | LedAnimation::Comet => {
                self.leds.rotate_right(1)
            }
            _ => {
                let phase = (self.frame % 256) as u8;
                for (i, led) in self.leds.iter_mut().enumerate() {
                    let shift = phase.wrapping_add((i as u8).wrapping_mul(51));
                    *led = [shift, 255 - shift, led[2]];
                }
            }
        }
    }
}

impl Peripherals for SimulatedBadge {
    fn apply(&mut self, command: &ActuatorCommand) {
        match command {
            ActuatorCommand::DisplayBrightness(level) => self.display_brightness = *level,
            ActuatorCommand::LedBrightness(level) => self.led_brightness = *level,
            ActuatorCommand::LedAnimation(animation) => self.animation = *animation,
            ActuatorCommand::Led { index, color } => {
                if let Some(led) = self.leds.get_mut(*index) {
                    *led = *color;
                }
            }
            ActuatorCommand::BackLed(mode) => self.back_led = *mode,
            ActuatorCommand::ShareUrl(url) => {
                info!("[BADGE] NFC tag and QR code now share {}", url);
                self.shared_url = Some(url.clone());
            }
        }
    }

    fn read(&mut self, sensor: Sensor) -> Option<Reading> {
        let reading = match sensor {
            Sensor::Temperature => Reading::Number(self.temperature),
            Sensor::Humidity => Reading::Number(self.humidity),
            Sensor::AmbientLight => Reading::Number(self.ambient_light),
            Sensor::Acceleration(axis) => {
                let i = match axis {
                    Axis::X => 0,
                    Axis::Y => 1,
                    Axis::Z => 2,
                };
                Reading::Number(self.acceleration[i])
            }
            Sensor::Button(i) => Reading::Pressed(*self.buttons.get(i)?),
            Sensor::Led(i) => Reading::Color(*self.leds.get(i)?),
        };
        Some(reading)
    }

    fn poll_button_press(&mut self) -> Option<usize> {
        self.presses.pop_front()
    }

    fn update(&mut self) {
        self.animate();
    }
}

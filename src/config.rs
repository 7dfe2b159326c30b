//! Badge configuration
//!
//! Every field has a default, so an empty (or missing) TOML file yields a
//! working configuration for a badge on `/dev/ttyUSB0`.

use expresslink_shared::timing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the TOML configuration file
pub const CONFIG_ENV: &str = "BADGE_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BadgeConfig {
    pub link: LinkConfig,
    pub timing: TimingConfig,
    pub shadow: ShadowConfig,
    pub signal: SignalConfig,
    pub echo: EchoConfig,
}

/// How the module is reached
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinkConfig {
    /// Direct UART (115200 8N1 unless overridden)
    Serial {
        port: String,
        #[serde(default = "default_baud")]
        baud: u32,
    },
    /// TCP serial bridge (e.g. ser2net) for development
    Tcp { address: String },
}

fn default_baud() -> u32 {
    timing::BAUDRATE
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::Serial {
            port: "/dev/ttyUSB0".into(),
            baud: timing::BAUDRATE,
        }
    }
}

/// Link and control-loop timing, all in milliseconds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_delay_ms: u64,
    pub response_timeout_ms: u64,
    pub continuation_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub event_poll_interval_ms: u64,
    pub max_events_per_cycle: u32,
    pub update_rate_ms: u64,
    pub high_update_rate_ms: u64,
    pub loop_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: timing::SETTLE_DELAY_MS,
            response_timeout_ms: timing::RESPONSE_TIMEOUT_MS,
            continuation_timeout_ms: timing::CONTINUATION_TIMEOUT_MS,
            connect_timeout_ms: timing::CONNECT_TIMEOUT_MS,
            event_poll_interval_ms: timing::EVENT_POLL_INTERVAL_MS,
            max_events_per_cycle: timing::MAX_EVENTS_PER_CYCLE,
            update_rate_ms: timing::DEFAULT_UPDATE_RATE_MS,
            high_update_rate_ms: timing::HIGH_UPDATE_RATE_MS,
            loop_interval_ms: 10,
        }
    }
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn continuation_timeout(&self) -> Duration {
        Duration::from_millis(self.continuation_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn update_rate(&self) -> Duration {
        Duration::from_millis(self.update_rate_ms)
    }

    pub fn high_update_rate(&self) -> Duration {
        Duration::from_millis(self.high_update_rate_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

/// Shadow synchronization settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShadowConfig {
    /// Named shadow index; `None` uses the classic (unnamed) shadow
    pub index: Option<u8>,
    /// URL shared on the NFC tag and QR code at startup
    pub initial_url: String,
    /// URLs selected by buttons 1..=3
    pub button_urls: Vec<String>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            index: None,
            initial_url: "https://aws.amazon.com/iot-expresslink/".into(),
            button_urls: vec![
                "https://aws.amazon.com/iot-expresslink/".into(),
                "https://docs.aws.amazon.com/iot-expresslink/latest/programmersguide/elpg-commands.html".into(),
                "https://docs.aws.amazon.com/iot-expresslink/latest/programmersguide/elpg-event-handling.html".into(),
            ],
        }
    }
}

/// Event-pending signal input
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    /// sysfs GPIO value file wired to the module's EVENT pin; polled when unset
    pub gpio: Option<PathBuf>,
    pub debounce_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            gpio: None,
            debounce_ms: timing::EVENT_SIGNAL_DEBOUNCE_MS,
        }
    }
}

impl SignalConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Command echo logging
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EchoConfig {
    /// Log every request and response line
    pub enabled: bool,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl BadgeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BadgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `BADGE_CONFIG` if set, otherwise use defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid("response_timeout_ms must be non-zero".into()));
        }
        if self.timing.update_rate_ms == 0 || self.timing.high_update_rate_ms == 0 {
            return Err(ConfigError::Invalid("update rates must be non-zero".into()));
        }
        if let LinkConfig::Serial { port, .. } = &self.link {
            if port.is_empty() {
                return Err(ConfigError::Invalid("serial port must not be empty".into()));
            }
        }
        Ok(())
    }
}

//! Configuration dictionary (`CONF?` / `CONF`)

use super::engine::{CommandEngine, CommandError};
use crate::transport::TransportStream;
use expresslink_shared::codec::escape_value;
use std::fmt;

/// Access mode of a dictionary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

/// Documented configuration dictionary keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    About,
    Version,
    TechSpec,
    ThingName,
    Certificate,
    CustomName,
    Endpoint,
    RootCA,
    ShadowToken,
    DefenderPeriod,
    HotaCertificate,
    OtaCertificate,
    Ssid,
    Passphrase,
    Apn,
    QoS,
    EnableShadow,
    /// Name of the shadow with the given index
    Shadow(u8),
}

impl ConfigKey {
    pub fn access(self) -> Access {
        match self {
            ConfigKey::About
            | ConfigKey::Version
            | ConfigKey::TechSpec
            | ConfigKey::ThingName
            | ConfigKey::Certificate => Access::ReadOnly,
            ConfigKey::Passphrase => Access::WriteOnly,
            _ => Access::ReadWrite,
        }
    }

    /// Certificates are read back in PEM form
    pub fn is_pem(self) -> bool {
        matches!(
            self,
            ConfigKey::Certificate
                | ConfigKey::RootCA
                | ConfigKey::HotaCertificate
                | ConfigKey::OtaCertificate
        )
    }

    fn query(self) -> String {
        if self.is_pem() {
            format!("CONF? {self} pem")
        } else {
            format!("CONF? {self}")
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigKey::About => "About",
            ConfigKey::Version => "Version",
            ConfigKey::TechSpec => "TechSpec",
            ConfigKey::ThingName => "ThingName",
            ConfigKey::Certificate => "Certificate",
            ConfigKey::CustomName => "CustomName",
            ConfigKey::Endpoint => "Endpoint",
            ConfigKey::RootCA => "RootCA",
            ConfigKey::ShadowToken => "ShadowToken",
            ConfigKey::DefenderPeriod => "DefenderPeriod",
            ConfigKey::HotaCertificate => "HOTAcertificate",
            ConfigKey::OtaCertificate => "OTAcertificate",
            ConfigKey::Ssid => "SSID",
            ConfigKey::Passphrase => "Passphrase",
            ConfigKey::Apn => "APN",
            ConfigKey::QoS => "QoS",
            ConfigKey::EnableShadow => "EnableShadow",
            ConfigKey::Shadow(index) => return write!(f, "Shadow{index}"),
        };
        f.write_str(name)
    }
}

impl<S: TransportStream> CommandEngine<S> {
    /// Read a dictionary value
    pub async fn conf_get(&mut self, key: ConfigKey) -> Result<String, CommandError> {
        if key.access() == Access::WriteOnly {
            return Err(CommandError::WriteOnly(key.to_string()));
        }

        let payload = self.require(&key.query()).await?;
        if key.is_pem() {
            let body = payload.strip_prefix("pem").unwrap_or(&payload);
            Ok(body.trim().to_string())
        } else {
            Ok(payload)
        }
    }

    /// Write a dictionary value (escaped for transmission)
    pub async fn conf_set(&mut self, key: ConfigKey, value: &str) -> Result<(), CommandError> {
        if key.access() == Access::ReadOnly {
            return Err(CommandError::ReadOnly(key.to_string()));
        }
        self.require(&format!("CONF {key}={}", escape_value(value)))
            .await?;
        Ok(())
    }

    /// AWS IoT thing name of this module
    pub async fn thing_name(&mut self) -> Result<String, CommandError> {
        self.conf_get(ConfigKey::ThingName).await
    }

    pub async fn shadow_enabled(&mut self) -> Result<bool, CommandError> {
        Ok(self.conf_get(ConfigKey::EnableShadow).await? == "1")
    }

    pub async fn enable_shadow(&mut self, enabled: bool) -> Result<(), CommandError> {
        let value = if enabled { "1" } else { "0" };
        self.conf_set(ConfigKey::EnableShadow, value).await
    }
}

//! Typed module commands
//!
//! Connection control, status queries, OTA state and the device shadow
//! command family. Everything goes through [`CommandEngine::execute`].

use super::engine::{CommandEngine, CommandError};
use crate::transport::TransportStream;
use chrono::NaiveDateTime;
use expresslink_shared::CommandResult;
use tracing::{info, warn};

/// CONFMODE parameter used when none is given
pub const DEFAULT_CONFMODE_NAME: &str = "AWS-ExpressLink-Demo-Badge";

/// Parsed `CONNECT?` response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Onboarded to a customer account (not the staging account)
    pub customer_account: bool,
}

/// Parsed `TIME?` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTime {
    pub timestamp: NaiveDateTime,
    /// Time source reported by the module (e.g. SNTP)
    pub source: String,
}

impl ModuleTime {
    /// Parse `date YYYY/MM/DD time hh:mm:ss.xx SOURCE`
    pub fn parse(payload: &str) -> Option<Self> {
        let mut fields = payload.split_whitespace();
        if fields.next()? != "date" {
            return None;
        }
        let date = fields.next()?;
        if fields.next()? != "time" {
            return None;
        }
        let time = fields.next()?;
        let source = fields.collect::<Vec<_>>().join(" ");

        let timestamp =
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y/%m/%d %H:%M:%S%.f").ok()?;
        Some(Self { timestamp, source })
    }
}

/// Module OTA state codes from `OTA?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    /// 0: no OTA in progress
    Idle,
    /// 1: module firmware update proposed; detail carries the version
    UpdateProposed,
    /// 2: host update proposed; detail carries operator metadata
    HostUpdateProposed,
    /// 3: download or signature verification still running
    InProgress,
    /// 4: new module image verified; module is ready to reboot
    ModuleImageReady,
    /// 5: new host image verified; detail carries the file size
    HostImageReady,
    Unknown(u32),
}

impl From<u32> for OtaState {
    fn from(code: u32) -> Self {
        match code {
            0 => OtaState::Idle,
            1 => OtaState::UpdateProposed,
            2 => OtaState::HostUpdateProposed,
            3 => OtaState::InProgress,
            4 => OtaState::ModuleImageReady,
            5 => OtaState::HostImageReady,
            other => OtaState::Unknown(other),
        }
    }
}

/// Parsed `OTA?` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaStatus {
    pub state: OtaState,
    pub detail: Option<String>,
}

/// Build `SHADOW[n] <verb>`
fn shadow_command(index: Option<u8>, verb: &str) -> String {
    match index {
        Some(n) => format!("SHADOW{n} {verb}"),
        None => format!("SHADOW {verb}"),
    }
}

impl<S: TransportStream> CommandEngine<S> {
    /// `CONNECT` (blocking, long timeout) or `CONNECT!` (returns immediately)
    pub async fn connect(&mut self, non_blocking: bool) -> CommandResult {
        if non_blocking {
            self.execute("CONNECT!").await
        } else {
            info!("[EL] Connecting to AWS IoT (this may take a while)");
            let wait = self.connect_timeout();
            self.execute_with_timeout("CONNECT", wait).await
        }
    }

    pub async fn disconnect(&mut self) -> CommandResult {
        self.execute("DISCONNECT").await
    }

    /// Query `CONNECT?`
    pub async fn connection_status(&mut self) -> Result<ConnectionStatus, CommandError> {
        let payload = self.require("CONNECT?").await?;
        let mut fields = payload.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(connected), Some(account)) => Ok(ConnectionStatus {
                connected: connected == "1",
                customer_account: account == "1",
            }),
            _ => Err(CommandError::UnexpectedPayload {
                command: "CONNECT?".into(),
                payload,
            }),
        }
    }

    /// Enter low-power sleep for `duration` seconds, optionally in a numbered mode
    pub async fn sleep(&mut self, duration: u32, mode: Option<u8>) -> CommandResult {
        let command = match mode {
            Some(mode) => format!("SLEEP{mode} {duration}"),
            None => format!("SLEEP {duration}"),
        };
        self.execute(&command).await
    }

    pub async fn reset(&mut self) -> CommandResult {
        self.execute("RESET").await
    }

    pub async fn factory_reset(&mut self) -> CommandResult {
        self.execute("FACTORY_RESET").await
    }

    /// Enter configuration mode (Wi-Fi provisioning access point)
    pub async fn confmode(&mut self, params: Option<&str>) -> CommandResult {
        let params = params.unwrap_or(DEFAULT_CONFMODE_NAME);
        self.execute(&format!("CONFMODE {params}")).await
    }

    /// Current module time; `None` when unavailable
    pub async fn time(&mut self) -> Option<ModuleTime> {
        let result = self.execute("TIME?").await;
        if !result.success {
            return None;
        }
        let time = ModuleTime::parse(&result.payload);
        if time.is_none() {
            warn!("[EL] Unrecognized TIME? payload: {:?}", result.payload);
        }
        time
    }

    /// Raw `WHERE?` location line; `None` when unavailable
    pub async fn location(&mut self) -> Option<String> {
        let result = self.execute("WHERE?").await;
        if result.success && result.payload.starts_with("date") {
            Some(result.payload)
        } else {
            None
        }
    }

    /// Query `OTA?`
    pub async fn ota_state(&mut self) -> Result<OtaStatus, CommandError> {
        let payload = self.require("OTA?").await?;
        let (code, detail) = match payload.split_once(' ') {
            Some((code, detail)) => (code, Some(detail.trim().to_string())),
            None => (payload.as_str(), None),
        };
        let code: u32 = code.parse().map_err(|_| CommandError::UnexpectedPayload {
            command: "OTA?".into(),
            payload: payload.clone(),
        })?;
        Ok(OtaStatus {
            state: OtaState::from(code),
            detail: detail.filter(|d| !d.is_empty()),
        })
    }

    pub async fn ota_accept(&mut self) -> CommandResult {
        self.execute("OTA ACCEPT").await
    }

    pub async fn ota_close(&mut self) -> CommandResult {
        self.execute("OTA CLOSE").await
    }

    pub async fn ota_flush(&mut self) -> CommandResult {
        self.execute("OTA FLUSH").await
    }

    /// Start shadow synchronization for `index`
    pub async fn shadow_init(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "INIT")).await
    }

    /// Request the shadow document (answered by a shadow-doc event)
    pub async fn shadow_doc(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "DOC")).await
    }

    /// Fetch the document announced by a shadow-doc event
    pub async fn shadow_get_doc(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "GET DOC")).await
    }

    /// Publish a shadow update document
    pub async fn shadow_update(&mut self, document: &str, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, &format!("UPDATE {document}")))
            .await
    }

    pub async fn shadow_get_update(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "GET UPDATE")).await
    }

    /// Subscribe to delta notifications
    pub async fn shadow_subscribe(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "SUBSCRIBE")).await
    }

    pub async fn shadow_unsubscribe(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "UNSUBSCRIBE")).await
    }

    /// Fetch the delta announced by a shadow-delta event
    pub async fn shadow_get_delta(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "GET DELTA")).await
    }

    pub async fn shadow_delete(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "DELETE")).await
    }

    pub async fn shadow_get_delete(&mut self, index: Option<u8>) -> CommandResult {
        self.execute(&shadow_command(index, "GET DELETE")).await
    }
}

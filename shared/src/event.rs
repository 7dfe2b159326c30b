//! Event taxonomy and `EVENT?` line parsing
//!
//! A pending event is reported as:
//! ```text
//! OK {event_id} {parameter} {mnemonic} [detail]
//! ```

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Event identifiers raised by the module
///
/// Identifiers 10..=19 and 28..=999 are reserved. Anything not listed here
/// is preserved as [`EventKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// parameter = topic index. A message was received on that topic.
    Message,
    /// parameter = 0. The module has entered the active state.
    Startup,
    /// parameter = 0. Connection unexpectedly lost.
    ConnectionLost,
    /// parameter = 0. Receive buffer overrun (topic in detail).
    Overrun,
    /// parameter = 0. OTA event (see `OTA?`).
    Ota,
    /// parameter = connection hint. Connection established or failed.
    Connect,
    /// parameter = 0. CONFMODE exit with success.
    ConfMode,
    /// parameter = topic index. Subscription accepted.
    SubscribeAccepted,
    /// parameter = topic index. Subscription rejected.
    SubscribeRejected,
    /// parameter = shadow index. Shadow initialization succeeded.
    ShadowInit,
    /// parameter = shadow index. Shadow initialization failed.
    ShadowInitFailed,
    /// parameter = shadow index. Shadow document received.
    ShadowDoc,
    /// parameter = shadow index. Shadow update result received.
    ShadowUpdate,
    /// parameter = shadow index. Shadow delta received.
    ShadowDelta,
    /// parameter = shadow index. Shadow delete result received.
    ShadowDelete,
    /// parameter = shadow index. Delta subscription accepted.
    ShadowSubscribeAccepted,
    /// parameter = shadow index. Delta subscription rejected.
    ShadowSubscribeRejected,
    /// Identifier outside the documented taxonomy
    Unknown(u32),
}

impl EventKind {
    /// Numeric identifier on the wire
    pub fn code(self) -> u32 {
        match self {
            EventKind::Message => 1,
            EventKind::Startup => 2,
            EventKind::ConnectionLost => 3,
            EventKind::Overrun => 4,
            EventKind::Ota => 5,
            EventKind::Connect => 6,
            EventKind::ConfMode => 7,
            EventKind::SubscribeAccepted => 8,
            EventKind::SubscribeRejected => 9,
            EventKind::ShadowInit => 20,
            EventKind::ShadowInitFailed => 21,
            EventKind::ShadowDoc => 22,
            EventKind::ShadowUpdate => 23,
            EventKind::ShadowDelta => 24,
            EventKind::ShadowDelete => 25,
            EventKind::ShadowSubscribeAccepted => 26,
            EventKind::ShadowSubscribeRejected => 27,
            EventKind::Unknown(code) => code,
        }
    }

    /// Events of the shadow family (20..=27)
    pub fn is_shadow(self) -> bool {
        (20..=27).contains(&self.code())
    }
}

impl From<u32> for EventKind {
    fn from(code: u32) -> Self {
        match code {
            1 => EventKind::Message,
            2 => EventKind::Startup,
            3 => EventKind::ConnectionLost,
            4 => EventKind::Overrun,
            5 => EventKind::Ota,
            6 => EventKind::Connect,
            7 => EventKind::ConfMode,
            8 => EventKind::SubscribeAccepted,
            9 => EventKind::SubscribeRejected,
            20 => EventKind::ShadowInit,
            21 => EventKind::ShadowInitFailed,
            22 => EventKind::ShadowDoc,
            23 => EventKind::ShadowUpdate,
            24 => EventKind::ShadowDelta,
            25 => EventKind::ShadowDelete,
            26 => EventKind::ShadowSubscribeAccepted,
            27 => EventKind::ShadowSubscribeRejected,
            other => EventKind::Unknown(other),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Unknown(code) => write!(f, "Unknown({})", code),
            other => write!(f, "{:?}({})", other, other.code()),
        }
    }
}

/// A decoded out-of-band notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub parameter: u32,
    pub mnemonic: String,
    pub detail: Option<String>,
}

/// Errors parsing an `EVENT?` payload
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventParseError {
    #[error("Malformed event line: {0:?}")]
    Malformed(String),
}

fn event_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+) (\d+) (\S+)(?: (.+))?$").expect("event pattern is valid")
    })
}

impl Event {
    /// Parse the payload of a non-empty `EVENT?` response
    pub fn parse(line: &str) -> Result<Self, EventParseError> {
        let malformed = || EventParseError::Malformed(line.to_string());
        let caps = event_pattern().captures(line.trim()).ok_or_else(malformed)?;

        let id: u32 = caps[1].parse().map_err(|_| malformed())?;
        let parameter: u32 = caps[2].parse().map_err(|_| malformed())?;
        let detail = caps
            .get(4)
            .map(|m| m.as_str().trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            kind: EventKind::from(id),
            parameter,
            mnemonic: caps[3].to_string(),
            detail,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.parameter, self.mnemonic)?;
        if let Some(detail) = &self.detail {
            write!(f, " {}", detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(EventKind::Startup.code(), 2);
        assert_eq!(EventKind::ShadowDoc.code(), 22);
        assert_eq!(EventKind::ShadowDelta.code(), 24);
        assert_eq!(EventKind::ShadowSubscribeRejected.code(), 27);
        for code in (1..=9).chain(20..=27) {
            assert_eq!(EventKind::from(code).code(), code);
            assert!(!matches!(EventKind::from(code), EventKind::Unknown(_)));
        }
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let event = Event::parse("42 7 FUTURE").expect("parse failed");
        assert_eq!(event.kind, EventKind::Unknown(42));
        assert_eq!(event.kind.code(), 42);
        assert_eq!(event.parameter, 7);
    }

    #[test]
    fn test_parse_with_detail() {
        let event = Event::parse("4 0 OVERRUN sensors/temperature").expect("parse failed");
        assert_eq!(event.kind, EventKind::Overrun);
        assert_eq!(event.mnemonic, "OVERRUN");
        assert_eq!(event.detail.as_deref(), Some("sensors/temperature"));
    }

    #[test]
    fn test_parse_shadow_delta() {
        let event = Event::parse("24 0 SHADOW_DELTA").expect("parse failed");
        assert_eq!(event.kind, EventKind::ShadowDelta);
        assert!(event.kind.is_shadow());
        assert_eq!(event.detail, None);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(Event::parse("STARTUP").is_err());
        assert!(Event::parse("2 STARTUP").is_err());
        assert!(Event::parse("x 0 STARTUP").is_err());
        assert!(Event::parse("").is_err());
    }

    #[test]
    fn test_display() {
        let event = Event::parse("2 0 STARTUP").unwrap();
        assert_eq!(event.to_string(), "Startup(2) 0 STARTUP");
    }
}

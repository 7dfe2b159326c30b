//! ExpressLink Shared Protocol Types
//!
//! This crate provides the AT line codec, response classification, event
//! taxonomy, shadow documents and the drain state machine used by the badge
//! device.

pub mod codec;
pub mod event;
pub mod response;
pub mod shadow;
pub mod state_machine;

// Re-export commonly used types at crate root
pub use codec::{CodecError, LineDecoder};
pub use event::{Event, EventKind, EventParseError};
pub use response::{CommandResult, ProtocolError, ResponseHead, GENERIC_ERROR_CODE};
pub use shadow::{Branch, FetchedDocument, PropertyMap, ShadowDocument, ShadowError};

/// Timing parameters for the module link and the control loop
pub mod timing {
    /// Default UART baud rate (8N1, no flow control)
    pub const BAUDRATE: u32 = 115_200;

    /// Delay before reading a response so the module can fill the line
    pub const SETTLE_DELAY_MS: u64 = 100;

    /// Maximum wait for a response terminator
    pub const RESPONSE_TIMEOUT_MS: u64 = 30_000;

    /// Maximum wait for each continuation line
    pub const CONTINUATION_TIMEOUT_MS: u64 = 1_000;

    /// Self-test attempts before the link is declared unusable
    pub const SELF_TEST_ATTEMPTS: u32 = 5;

    /// Wait for each self-test reply
    pub const SELF_TEST_TIMEOUT_MS: u64 = 1_000;

    /// Blocking `CONNECT` may take up to two minutes
    pub const CONNECT_TIMEOUT_MS: u64 = 120_000;

    /// Event signal debounce interval
    pub const EVENT_SIGNAL_DEBOUNCE_MS: u64 = 1;

    /// Poll interval when no event signal is wired
    pub const EVENT_POLL_INTERVAL_MS: u64 = 250;

    /// Events drained per loop iteration before periodic work gets a turn
    pub const MAX_EVENTS_PER_CYCLE: u32 = 16;

    /// Periodic shadow report interval
    pub const DEFAULT_UPDATE_RATE_MS: u64 = 4_000;

    /// Periodic shadow report interval in high-rate mode
    pub const HIGH_UPDATE_RATE_MS: u64 = 100;
}

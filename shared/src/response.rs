//! Command response classification
//!
//! Every request yields exactly one response line:
//! ```text
//! OK[#] [payload]        success, # additional lines follow
//! ERR{code} [message]    failure with a numeric code
//! ```

use thiserror::Error;

/// Generic code substituted when a response cannot be parsed (ERR2 PARSE ERROR)
pub const GENERIC_ERROR_CODE: u32 = 2;

/// Uniform result of a single command exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub payload: String,
    /// Present iff `success` is false
    pub error_code: Option<u32>,
}

impl CommandResult {
    /// Successful response with its (trimmed) payload
    pub fn ok(payload: impl AsRef<str>) -> Self {
        Self {
            success: true,
            payload: payload.as_ref().trim().to_string(),
            error_code: None,
        }
    }

    /// Well-formed `ERR` response from the module
    pub fn peer_error(code: u32, message: impl AsRef<str>) -> Self {
        Self {
            success: false,
            payload: message.as_ref().trim().to_string(),
            error_code: Some(code),
        }
    }

    /// Unparseable or incomplete response
    pub fn parse_failure(payload: impl AsRef<str>) -> Self {
        Self::peer_error(GENERIC_ERROR_CODE, payload)
    }

    /// Success with an empty payload (e.g. `EVENT?` with nothing queued)
    pub fn is_empty_ok(&self) -> bool {
        self.success && self.payload.is_empty()
    }

    /// Human-readable name of the error code, if known
    pub fn error_name(&self) -> Option<&'static str> {
        self.error_code.and_then(error_name)
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.error_code {
            None => write!(f, "OK {}", self.payload),
            Some(code) => match error_name(code) {
                Some(name) => write!(f, "ERR{} ({}) {}", code, name, self.payload),
                None => write!(f, "ERR{} {}", code, self.payload),
            },
        }
    }
}

/// Protocol violations in a response line
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("ERR response without numeric code: {0:?}")]
    MissingErrorCode(String),

    #[error("Invalid continuation count in: {0:?}")]
    InvalidLineCount(String),

    #[error("Unexpected response: {0:?}")]
    UnexpectedResponse(String),
}

impl ProtocolError {
    /// Text carried into the generic failure result
    pub fn remainder(&self) -> &str {
        match self {
            ProtocolError::MissingErrorCode(rest) => rest,
            ProtocolError::InvalidLineCount(line) | ProtocolError::UnexpectedResponse(line) => line,
        }
    }
}

/// Classified first line of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHead {
    /// `OK[#] text`
    Ok { continuation: usize, text: String },
    /// `ERR{code} message`
    Err { code: u32, message: String },
}

/// Split leading ASCII digits off a string
fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Classify the first line of a response
pub fn parse_head(line: &str) -> Result<ResponseHead, ProtocolError> {
    if let Some(rest) = line.strip_prefix("OK") {
        let (digits, text) = split_digits(rest);
        let continuation = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| ProtocolError::InvalidLineCount(line.to_string()))?
        };
        return Ok(ResponseHead::Ok {
            continuation,
            text: text.to_string(),
        });
    }

    if let Some(rest) = line.strip_prefix("ERR") {
        let (digits, message) = split_digits(rest);
        return match digits.parse() {
            Ok(code) => Ok(ResponseHead::Err {
                code,
                message: message.to_string(),
            }),
            Err(_) => Err(ProtocolError::MissingErrorCode(rest.to_string())),
        };
    }

    Err(ProtocolError::UnexpectedResponse(line.to_string()))
}

/// Documented ExpressLink error codes
pub fn error_name(code: u32) -> Option<&'static str> {
    let name = match code {
        1 => "OVERFLOW",
        2 => "PARSE ERROR",
        3 => "COMMAND NOT FOUND",
        4 => "PARAMETER ERROR",
        5 => "INVALID ESCAPE",
        6 => "NO CONNECTION",
        7 => "TOPIC OUT OF RANGE",
        8 => "TOPIC UNDEFINED",
        9 => "INVALID KEY LENGTH",
        10 => "INVALID KEY NAME",
        11 => "UNKNOWN KEY",
        12 => "KEY READONLY",
        13 => "KEY WRITEONLY",
        14 => "UNABLE TO CONNECT",
        15 => "TIME NOT AVAILABLE",
        16 => "LOCATION NOT AVAILABLE",
        17 => "MODE NOT AVAILABLE",
        18 => "ACTIVE CONNECTION",
        19 => "HOST IMAGE NOT AVAILABLE",
        20 => "INVALID ADDRESS",
        21 => "INVALID OTA UPDATE",
        22 => "INVALID QUERY",
        23 => "INVALID SIGNATURE",
        _ => return None,
    };
    Some(name)
}

//! Line codec for the ExpressLink UART
//!
//! Requests are framed as:
//! ```text
//! AT+<command>\r\n
//! ```
//!
//! Responses are newline-terminated text lines. The module pads lines with
//! NUL and high reserved bytes (0xFA..=0xFF); those are stripped together
//! with CR/LF before a line is handed to the caller.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Maximum bytes buffered without a terminator (fits a PEM certificate chain)
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

/// Bytes stripped from both ends of every received line
pub const PADDING_BYTES: &[u8] = b"\r\n\x00\xff\xfe\xfd\xfc\xfb\xfa";

/// Bare attention request used for the UART self-test
pub const SELF_TEST_REQUEST: &[u8] = b"AT\n";

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Line too long: {0} bytes without terminator (max: {MAX_LINE_LENGTH})")]
    LineTooLong(usize),

    #[error("Empty command")]
    EmptyCommand,

    #[error("Command contains a line terminator: {0:?}")]
    EmbeddedTerminator(String),
}

/// Encode a command as an `AT+` request line
pub fn encode_request(command: &str) -> Result<Bytes, CodecError> {
    if command.is_empty() {
        return Err(CodecError::EmptyCommand);
    }
    if command.contains(|c| c == '\r' || c == '\n') {
        return Err(CodecError::EmbeddedTerminator(command.to_string()));
    }

    let mut buf = BytesMut::with_capacity(command.len() + 5);
    buf.put_slice(b"AT+");
    buf.put_slice(command.as_bytes());
    buf.put_slice(b"\r\n");
    Ok(buf.freeze())
}

/// Strip CR/LF and padding bytes from both ends of a raw line
pub fn strip_padding(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !PADDING_BYTES.contains(b))
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !PADDING_BYTES.contains(b))
        .map_or(start, |i| i + 1);
    &raw[start..end]
}

/// Escape a configuration value for `CONF key=value`
///
/// Backslash becomes `\\`, CR becomes `\D` and LF becomes `\A`.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\D"),
            '\n' => out.push_str("\\A"),
            c => out.push(c),
        }
    }
    out
}

/// Streaming line decoder
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes received but not yet terminated
    buffer: BytesMut,
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete line
    ///
    /// Returns `Ok(None)` when no terminator has been received yet.
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let raw = self.buffer.split_to(pos + 1);
                Ok(Some(String::from_utf8_lossy(strip_padding(&raw)).into_owned()))
            }
            None if self.buffer.len() > MAX_LINE_LENGTH => {
                let len = self.buffer.len();
                self.buffer.clear();
                Err(CodecError::LineTooLong(len))
            }
            None => Ok(None),
        }
    }

    /// Take whatever unterminated bytes are buffered
    pub fn take_partial(&mut self) -> String {
        let raw = self.buffer.split();
        String::from_utf8_lossy(strip_padding(&raw)).into_owned()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request() {
        let encoded = encode_request("CONNECT?").expect("encode failed");
        assert_eq!(&encoded[..], b"AT+CONNECT?\r\n");
    }

    #[test]
    fn test_encode_rejects_bad_commands() {
        assert_eq!(encode_request(""), Err(CodecError::EmptyCommand));
        assert!(matches!(
            encode_request("SEND1 a\nb"),
            Err(CodecError::EmbeddedTerminator(_))
        ));
    }

    #[test]
    fn test_strip_padding() {
        assert_eq!(strip_padding(b"\x00OK 1\r\n"), b"OK 1");
        assert_eq!(strip_padding(b"OK\xff\xfe\xfa\r\n"), b"OK");
        assert_eq!(strip_padding(b"\r\n"), b"");
        assert_eq!(strip_padding(b""), b"");
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("plain"), "plain");
        assert_eq!(escape_value("a\\b"), "a\\\\b");
        assert_eq!(escape_value("line1\r\nline2"), "line1\\D\\Aline2");
    }

    #[test]
    fn test_line_decoder_chunks() {
        let mut decoder = LineDecoder::new();

        decoder.extend(b"OK2 fir");
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.extend(b"st\r\nsecond\r\nthi");
        assert_eq!(decoder.decode_next().unwrap().as_deref(), Some("OK2 first"));
        assert_eq!(decoder.decode_next().unwrap().as_deref(), Some("second"));
        assert_eq!(decoder.decode_next().unwrap(), None);
        assert_eq!(decoder.take_partial(), "thi");
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_line_decoder_strips_padding() {
        let mut decoder = LineDecoder::new();
        decoder.extend(b"\x00\x00OK\xfc\r\n");
        assert_eq!(decoder.decode_next().unwrap().as_deref(), Some("OK"));
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = LineDecoder::new();
        decoder.extend(&vec![b'x'; MAX_LINE_LENGTH + 1]);
        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::LineTooLong(_))
        ));
        assert_eq!(decoder.buffer_len(), 0);
    }
}

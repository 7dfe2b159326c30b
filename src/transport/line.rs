//! Line transport over a byte stream
//!
//! Frames are newline-terminated. Reads wait at most a bounded time for the
//! terminator; a short settling delay before each read gives slow modules
//! time to fill the line.

use crate::transport::traits::TransportStream;
use expresslink_shared::codec::{CodecError, LineDecoder};
use futures::FutureExt;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

/// Errors reading or writing lines
#[derive(Error, Debug)]
pub enum LineError {
    #[error("Timed out waiting for line terminator (partial: {partial:?})")]
    Timeout { partial: String },

    #[error("Transport closed")]
    Closed,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Newline-framed reader/writer owning the transport stream
pub struct LineTransport<S> {
    stream: S,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
    settle_delay: Duration,
}

impl<S: TransportStream> LineTransport<S> {
    pub fn new(stream: S, settle_delay: Duration) -> Self {
        Self {
            stream,
            decoder: LineDecoder::new(),
            read_buf: vec![0u8; 1024],
            settle_delay,
        }
    }

    /// Write raw bytes and flush
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), LineError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Drop buffered and immediately readable input; returns bytes dropped
    pub fn discard_pending(&mut self) -> Result<usize, LineError> {
        let mut dropped = self.decoder.buffer_len();
        self.decoder.clear();
        self.stream.discard_input()?;

        loop {
            match self.stream.read(&mut self.read_buf).now_or_never() {
                Some(Ok(0)) => return Err(LineError::Closed),
                Some(Ok(n)) => dropped += n,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(dropped),
            }
        }
    }

    /// Receive one line, waiting at most `wait` for its terminator
    ///
    /// `settle` applies the settling delay first; skip it for continuation
    /// lines that are already in flight.
    pub async fn receive_line(&mut self, wait: Duration, settle: bool) -> Result<String, LineError> {
        if settle && !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let deadline = Instant::now() + wait;
        loop {
            if let Some(line) = self.decoder.decode_next()? {
                return Ok(line);
            }

            match timeout_at(deadline, self.stream.read(&mut self.read_buf)).await {
                Ok(Ok(0)) => return Err(LineError::Closed),
                Ok(Ok(n)) => self.decoder.extend(&self.read_buf[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(LineError::Timeout {
                        partial: self.decoder.take_partial(),
                    })
                }
            }
        }
    }

    /// Close the underlying stream
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.stream.shutdown().await
    }
}

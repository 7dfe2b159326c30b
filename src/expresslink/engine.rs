//! AT command engine
//!
//! Owns the line transport and enforces one outstanding request at a time:
//! every operation takes `&mut self`, so a new command can only be sent once
//! the previous response (continuations included) has been consumed.

use crate::config::TimingConfig;
use crate::transport::{LineError, LineTransport, TransportStream};
use expresslink_shared::codec;
use expresslink_shared::response::{parse_head, ResponseHead};
use expresslink_shared::{timing, CommandResult};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures of typed module commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("{command} failed: {result}")]
    Failed {
        command: String,
        result: CommandResult,
    },

    #[error("Unexpected payload for {command}: {payload:?}")]
    UnexpectedPayload { command: String, payload: String },

    #[error("Configuration key {0} is read-only")]
    ReadOnly(String),

    #[error("Configuration key {0} is write-only")]
    WriteOnly(String),
}

/// ExpressLink command engine
pub struct CommandEngine<S> {
    link: LineTransport<S>,
    response_timeout: Duration,
    continuation_timeout: Duration,
    connect_timeout: Duration,
    echo: bool,
    ready: bool,
}

impl<S: TransportStream> CommandEngine<S> {
    /// Create an engine over an open transport stream
    pub fn new(stream: S, timing: &TimingConfig) -> Self {
        Self {
            link: LineTransport::new(stream, timing.settle_delay()),
            response_timeout: timing.response_timeout(),
            continuation_timeout: timing.continuation_timeout(),
            connect_timeout: timing.connect_timeout(),
            echo: true,
            ready: false,
        }
    }

    /// Enable or disable request/response echo logging
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Whether the last self-test succeeded
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Probe the UART with bare `AT` requests until the module answers `OK`
    pub async fn self_test(&mut self) -> bool {
        let wait = Duration::from_millis(timing::SELF_TEST_TIMEOUT_MS);

        for attempt in 1..=timing::SELF_TEST_ATTEMPTS {
            if let Err(e) = self.link.discard_pending() {
                warn!("[EL] Self-test attempt {}: {}", attempt, e);
                continue;
            }
            if let Err(e) = self.link.send(codec::SELF_TEST_REQUEST).await {
                warn!("[EL] Self-test attempt {}: {}", attempt, e);
                continue;
            }

            match self.link.receive_line(wait, true).await {
                Ok(line) if line == "OK" => {
                    info!("[EL] Self-test passed (attempt {})", attempt);
                    self.ready = true;
                    return true;
                }
                Ok(line) => debug!("[EL] Self-test attempt {}: got {:?}", attempt, line),
                Err(e) => debug!("[EL] Self-test attempt {}: {}", attempt, e),
            }
        }

        error!(
            "[EL] Self-test failed after {} attempts",
            timing::SELF_TEST_ATTEMPTS
        );
        self.ready = false;
        false
    }

    /// Send `AT+<command>` and collect the response
    pub async fn execute(&mut self, command: &str) -> CommandResult {
        self.execute_with_timeout(command, self.response_timeout)
            .await
    }

    /// Send `AT+<command>` waiting at most `wait` for the first response line
    pub async fn execute_with_timeout(&mut self, command: &str, wait: Duration) -> CommandResult {
        let request = match codec::encode_request(command) {
            Ok(request) => request,
            Err(e) => {
                warn!("[EL] Not sending {:?}: {}", command, e);
                return CommandResult::parse_failure(e.to_string());
            }
        };

        match self.link.discard_pending() {
            Ok(0) => {}
            Ok(n) => debug!("[EL] Discarded {} stale bytes", n),
            Err(e) => {
                warn!("[EL] Link unusable before {:?}: {}", command, e);
                return CommandResult::parse_failure(e.to_string());
            }
        }

        if self.echo {
            debug!("[EL] > AT+{}", command);
        }
        if let Err(e) = self.link.send(&request).await {
            warn!("[EL] Failed to send {:?}: {}", command, e);
            return CommandResult::parse_failure(e.to_string());
        }

        let line = match self.link.receive_line(wait, true).await {
            Ok(line) => line,
            Err(LineError::Timeout { partial }) => {
                warn!("[EL] Incomplete response to {:?}: {:?}", command, partial);
                return CommandResult::parse_failure(partial);
            }
            Err(e) => {
                warn!("[EL] No response to {:?}: {}", command, e);
                return CommandResult::parse_failure(e.to_string());
            }
        };
        if self.echo {
            debug!("[EL] < {}", line);
        }

        match parse_head(&line) {
            Ok(ResponseHead::Ok { continuation, text }) => {
                let payload = self.read_continuation(text, continuation).await;
                CommandResult::ok(payload)
            }
            Ok(ResponseHead::Err { code, message }) => CommandResult::peer_error(code, message),
            Err(e) => {
                warn!("[EL] Protocol violation in response to {:?}: {}", command, e);
                CommandResult::parse_failure(e.remainder())
            }
        }
    }

    /// Append up to `count` continuation lines, stopping at the first empty or failed read
    async fn read_continuation(&mut self, mut payload: String, count: usize) -> String {
        for received in 0..count {
            match self.link.receive_line(self.continuation_timeout, false).await {
                Ok(line) if !line.is_empty() => {
                    if self.echo {
                        debug!("[EL] < {}", line);
                    }
                    payload.push('\n');
                    payload.push_str(&line);
                }
                Ok(_) => {
                    debug!("[EL] Continuation ended early ({}/{})", received, count);
                    break;
                }
                Err(e) => {
                    warn!(
                        "[EL] Continuation ended early ({}/{}): {}",
                        received, count, e
                    );
                    break;
                }
            }
        }
        payload
    }

    /// Run a command that must succeed, returning its payload
    pub async fn require(&mut self, command: &str) -> Result<String, CommandError> {
        let result = self.execute(command).await;
        if result.success {
            Ok(result.payload)
        } else {
            Err(CommandError::Failed {
                command: command.to_string(),
                result,
            })
        }
    }

    /// Close the transport
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.link.shutdown().await
    }
}

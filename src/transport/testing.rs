//! In-memory module peer for tests

use crate::transport::traits::TransportStream;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

#[async_trait]
impl TransportStream for DuplexStream {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Scripted ExpressLink peer on the far end of a duplex pipe
pub struct MockModule {
    requests: Arc<Mutex<Vec<String>>>,
    _task: JoinHandle<()>,
}

impl MockModule {
    /// Spawn a peer that answers each request line via `respond`
    ///
    /// Replies are written verbatim; include the `\r\n` terminators.
    pub fn spawn<F>(mut respond: F) -> (DuplexStream, MockModule)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let (host, device) = tokio::io::duplex(64 * 1024);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        let task = tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(device);
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim_end().to_string();
                log.lock().unwrap().push(line.clone());
                if let Some(reply) = respond(&line) {
                    if writer.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        });

        (
            host,
            MockModule {
                requests,
                _task: task,
            },
        )
    }

    /// Spawn a peer that answers requests with `replies` in order, then `OK`
    pub fn scripted(replies: &[&str]) -> (DuplexStream, MockModule) {
        let mut queue: VecDeque<String> = replies.iter().map(|r| format!("{r}\r\n")).collect();
        Self::spawn(move |_| Some(queue.pop_front().unwrap_or_else(|| "OK\r\n".into())))
    }

    /// Request lines received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

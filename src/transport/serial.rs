//! UART transport to the ExpressLink module

use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use expresslink_shared::timing;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

/// Serial stream wrapper implementing TransportStream
pub struct SerialTransportStream {
    inner: SerialStream,
}

impl SerialTransportStream {
    pub fn new(stream: SerialStream) -> Self {
        Self { inner: stream }
    }
}

impl AsyncRead for SerialTransportStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialTransportStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl TransportStream for SerialTransportStream {
    fn discard_input(&mut self) -> io::Result<()> {
        self.inner.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await?;
        Ok(())
    }
}

/// Serial connector for a UART device path
pub struct SerialConnector {
    port: String,
    baud: u32,
}

impl SerialConnector {
    /// Create a connector using 8N1 without flow control
    pub fn new(port: String, baud: u32) -> Self {
        Self { port, baud }
    }

    /// Create a connector at the module's default baud rate
    pub fn with_default_baud(port: String) -> Self {
        Self::new(port, timing::BAUDRATE)
    }
}

#[async_trait]
impl TransportConnector for SerialConnector {
    type Stream = SerialTransportStream;

    async fn connect(&self) -> Result<Self::Stream> {
        let stream = tokio_serial::new(&self.port, self.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| anyhow!("Failed to open {}: {}", self.port, e))?;
        Ok(SerialTransportStream::new(stream))
    }

    fn name(&self) -> &'static str {
        "Serial"
    }
}

//! Raw TCP delivery.
//!
//! Writes the JSON text to a host:port in a single write. No framing and no
//! trailing newline: the receiving end reads until the connection closes.

use super::{Sink, SinkError};
use crate::event::Event;
use crate::transition::Classification;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// A sink that writes the event JSON to a TCP endpoint.
pub struct TcpSink {
    addr: String,
}

impl TcpSink {
    /// Creates a TCP sink for a `host:port` address.
    pub fn new(addr: impl Into<String>) -> Result<Self, SinkError> {
        let addr = addr.into();
        if !addr.contains(':') {
            return Err(SinkError::InvalidConfig(format!(
                "TCP address must be host:port, got {:?}",
                addr
            )));
        }
        Ok(Self { addr })
    }

    /// Connects, writes the text, and closes the connection.
    #[instrument(skip(self, body), fields(addr = %self.addr))]
    pub async fn send_text(&self, body: &str) -> Result<(), SinkError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| SinkError::SendFailed(format!("connect to {} failed: {}", self.addr, e)))?;

        stream
            .write_all(body.as_bytes())
            .await
            .map_err(|e| SinkError::SendFailed(format!("write to {} failed: {}", self.addr, e)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| SinkError::SendFailed(format!("close of {} failed: {}", self.addr, e)))?;

        debug!(bytes = body.len(), "event written");
        Ok(())
    }
}

#[async_trait]
impl Sink for TcpSink {
    async fn send(
        &self,
        event: &Event,
        _classification: Classification,
    ) -> Result<(), SinkError> {
        let body = serde_json::to_string(event)
            .map_err(|e| SinkError::SendFailed(format!("failed to encode event: {}", e)))?;
        self.send_text(&body).await
    }

    fn name(&self) -> &str {
        "tcp"
    }
}

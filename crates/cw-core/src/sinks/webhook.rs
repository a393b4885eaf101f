//! Webhook delivery.
//!
//! POSTs the event JSON to an arbitrary URL. Unlike paging and email, the
//! webhook fires on every dispatch regardless of classification: the steady
//! state is for a downstream decision engine to see every check result.

use super::{Sink, SinkError};
use crate::event::Event;
use crate::transition::Classification;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A sink that sends the event JSON to a webhook URL.
pub struct WebhookSink {
    url: String,
    #[cfg(not(test))]
    client: reqwest::Client,
}

impl WebhookSink {
    /// Creates a webhook sink.
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let url = url.into();
        if url.is_empty() {
            return Err(SinkError::InvalidConfig(
                "webhook URL cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            url,
            #[cfg(not(test))]
            client: reqwest::Client::new(),
        })
    }

    #[cfg(not(test))]
    async fn post_event(&self, event: &Event) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| SinkError::SendFailed(format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            Err(SinkError::SendFailed(format!(
                "webhook returned {}: {}",
                status, body
            )))
        }
    }

    /// Mock send for testing.
    #[cfg(test)]
    async fn post_event(&self, _event: &Event) -> Result<(), SinkError> {
        Ok(())
    }
}

#[async_trait]
impl Sink for WebhookSink {
    #[instrument(skip(self, event), fields(url = %self.url))]
    async fn send(
        &self,
        event: &Event,
        _classification: Classification,
    ) -> Result<(), SinkError> {
        debug!(host = %event.host, plugin = %event.plugin, "posting event to webhook");
        self.post_event(event).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

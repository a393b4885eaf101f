//! Pager delivery via the PagerDuty events API.
//!
//! Warning and failure transitions trigger an incident; an ok transition
//! resolves it. Events for the same host/plugin pair share a dedup key so
//! the resolve lands on the incident the trigger opened.

use super::{Sink, SinkError};
use crate::event::{Event, Severity};
use crate::transition::Classification;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// A sink that triggers and resolves pager incidents.
pub struct PagerSink {
    routing_key: String,
    api_url: String,
    #[cfg(not(test))]
    client: reqwest::Client,
}

impl PagerSink {
    /// Creates a pager sink with the given service routing key.
    pub fn new(routing_key: impl Into<String>) -> Result<Self, SinkError> {
        let routing_key = routing_key.into();
        if routing_key.is_empty() {
            return Err(SinkError::InvalidConfig(
                "pager routing key cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            routing_key,
            api_url: DEFAULT_EVENTS_URL.to_string(),
            #[cfg(not(test))]
            client: reqwest::Client::new(),
        })
    }

    /// Overrides the events API endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn summary(event: &Event) -> String {
        format!(
            "{} {}: {} {}",
            event.host,
            event.plugin,
            event.severity.as_str().to_uppercase(),
            event.message
        )
    }

    fn action_for(severity: &Severity) -> &'static str {
        match severity {
            Severity::Ok => "resolve",
            Severity::Warning | Severity::Failure => "trigger",
        }
    }

    fn pager_severity(severity: &Severity) -> &'static str {
        match severity {
            Severity::Ok => "info",
            Severity::Warning => "warning",
            Severity::Failure => "critical",
        }
    }

    fn build_event(&self, event: &Event) -> PagerEvent {
        PagerEvent {
            routing_key: self.routing_key.clone(),
            event_action: Self::action_for(&event.severity).to_string(),
            dedup_key: format!("{}/{}", event.host, event.plugin),
            payload: PagerPayload {
                summary: Self::summary(event),
                source: event.host.clone(),
                severity: Self::pager_severity(&event.severity).to_string(),
            },
        }
    }

    /// Sends the event and returns the incident's dedup key.
    #[instrument(skip(self, event), fields(host = %event.host, plugin = %event.plugin))]
    pub async fn send_event(&self, event: &Event) -> Result<String, SinkError> {
        let pager_event = self.build_event(event);
        debug!(action = %pager_event.event_action, "sending pager event");

        let response = self.post_event(&pager_event).await?;
        Ok(response.dedup_key.unwrap_or(pager_event.dedup_key))
    }

    #[cfg(not(test))]
    async fn post_event(&self, pager_event: &PagerEvent) -> Result<PagerResponse, SinkError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(pager_event)
            .send()
            .await
            .map_err(|e| SinkError::SendFailed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(SinkError::SendFailed(format!(
                "pager API returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SinkError::SendFailed(format!("invalid pager API response: {}", e)))
    }

    /// Mock send for testing.
    #[cfg(test)]
    async fn post_event(&self, pager_event: &PagerEvent) -> Result<PagerResponse, SinkError> {
        Ok(PagerResponse {
            status: Some("success".to_string()),
            dedup_key: Some(pager_event.dedup_key.clone()),
            message: None,
        })
    }
}

#[async_trait]
impl Sink for PagerSink {
    async fn send(
        &self,
        event: &Event,
        _classification: Classification,
    ) -> Result<(), SinkError> {
        self.send_event(event).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "pager"
    }
}

/// Body POSTed to the events API.
#[derive(Debug, Serialize)]
struct PagerEvent {
    routing_key: String,
    event_action: String,
    dedup_key: String,
    payload: PagerPayload,
}

#[derive(Debug, Serialize)]
struct PagerPayload {
    summary: String,
    source: String,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct PagerResponse {
    #[allow(dead_code)]
    status: Option<String>,
    dedup_key: Option<String>,
    #[allow(dead_code)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProcessIdentity;

    fn test_event(severity: Severity) -> Event {
        let identity = ProcessIdentity::new("web01.example.org", 60, "check_disk");
        Event::new(&identity, severity, "disk 91% full")
    }

    #[test]
    fn test_empty_routing_key_rejected() {
        let result = PagerSink::new("");
        assert!(matches!(result, Err(SinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_summary_format() {
        let event = test_event(Severity::Failure);
        assert_eq!(
            PagerSink::summary(&event),
            "web01 check_disk: FAILURE disk 91% full"
        );
    }

    #[test]
    fn test_action_selection() {
        assert_eq!(PagerSink::action_for(&Severity::Ok), "resolve");
        assert_eq!(PagerSink::action_for(&Severity::Warning), "trigger");
        assert_eq!(PagerSink::action_for(&Severity::Failure), "trigger");
    }

    #[test]
    fn test_dedup_key_is_host_plugin() {
        let sink = PagerSink::new("key").unwrap();
        let pager_event = sink.build_event(&test_event(Severity::Warning));
        assert_eq!(pager_event.dedup_key, "web01/check_disk");
    }

    #[test]
    fn test_pager_severity_mapping() {
        assert_eq!(PagerSink::pager_severity(&Severity::Ok), "info");
        assert_eq!(PagerSink::pager_severity(&Severity::Warning), "warning");
        assert_eq!(PagerSink::pager_severity(&Severity::Failure), "critical");
    }

    #[test]
    fn test_event_serialization() {
        let sink = PagerSink::new("routing-key-123").unwrap();
        let pager_event = sink.build_event(&test_event(Severity::Failure));
        let json = serde_json::to_value(&pager_event).unwrap();

        assert_eq!(json["routing_key"], "routing-key-123");
        assert_eq!(json["event_action"], "trigger");
        assert_eq!(json["dedup_key"], "web01/check_disk");
        assert_eq!(
            json["payload"]["summary"],
            "web01 check_disk: FAILURE disk 91% full"
        );
        assert_eq!(json["payload"]["source"], "web01");
        assert_eq!(json["payload"]["severity"], "critical");
    }

    #[tokio::test]
    async fn test_send_event_returns_dedup_key() {
        let sink = PagerSink::new("key").unwrap();
        let dedup = sink.send_event(&test_event(Severity::Warning)).await.unwrap();
        assert_eq!(dedup, "web01/check_disk");
    }

    #[tokio::test]
    async fn test_sink_trait_send() {
        let sink = PagerSink::new("key").unwrap();
        let result = sink
            .send(&test_event(Severity::Ok), Classification::Transitioned)
            .await;
        assert!(result.is_ok());
        assert_eq!(sink.name(), "pager");
    }
}

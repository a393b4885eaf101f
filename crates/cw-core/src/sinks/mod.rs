//! Delivery sinks for alert events.
//!
//! Each channel (pager, email, webhook, raw TCP) implements the [`Sink`]
//! trait. [`SinkFanout`] applies the delivery policy and isolates failures:
//! one broken channel never blocks the others, and no sink failure ever
//! reaches the check that raised the alert.

mod email;
mod pager;
mod tcp;
mod webhook;

pub use email::{EmailSink, SmtpConfig};
pub use pager::PagerSink;
pub use tcp::TcpSink;
pub use webhook::WebhookSink;

use crate::dispatch::AlertOptions;
use crate::event::Event;
use crate::transition::Classification;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Errors that can occur when delivering to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Failed to deliver the event.
    #[error("failed to deliver event: {0}")]
    SendFailed(String),

    /// Invalid sink configuration.
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// Delivery was requested but the channel is not configured.
    #[error("{0} delivery requested but not configured")]
    NotConfigured(&'static str),
}

/// A delivery channel for alert events.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers an event.
    async fn send(&self, event: &Event, classification: Classification) -> Result<(), SinkError>;

    /// Returns the name of the sink, used in log context.
    fn name(&self) -> &str;
}

/// Which channels a single dispatch should reach.
///
/// Pager and email fire only on a severity transition; the webhook fires on
/// every dispatch so a downstream decision engine sees the steady state too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeliveryPlan {
    page: bool,
    email: bool,
    webhook: bool,
}

fn plan(classification: Classification, options: &AlertOptions) -> DeliveryPlan {
    let transitioned = classification == Classification::Transitioned;
    DeliveryPlan {
        page: options.page && transitioned,
        email: options.email.is_some() && transitioned,
        webhook: options.url.is_some(),
    }
}

/// Fans one event out to the channels the dispatch requested.
pub struct SinkFanout {
    pager: Option<PagerSink>,
    smtp: Option<SmtpConfig>,
}

impl SinkFanout {
    /// Creates a fan-out over the statically configured channels. Webhook
    /// targets arrive per-dispatch in [`AlertOptions`].
    pub fn new(pager: Option<PagerSink>, smtp: Option<SmtpConfig>) -> Self {
        Self { pager, smtp }
    }

    /// Delivers the event per policy. Never fails: each sink error is logged
    /// with host and plugin context and the remaining sinks still run.
    #[instrument(skip_all, fields(host = %event.host, plugin = %event.plugin))]
    pub async fn deliver(
        &self,
        event: &Event,
        classification: Classification,
        options: &AlertOptions,
    ) {
        let plan = plan(classification, options);

        if plan.page {
            match &self.pager {
                Some(pager) => self.run_sink(pager, event, classification).await,
                None => warn!(error = %SinkError::NotConfigured("pager"), "skipping page"),
            }
        }

        if plan.email {
            // options.email is Some when plan.email is set.
            let recipients = options.email.clone().unwrap_or_default();
            match &self.smtp {
                Some(smtp) => match EmailSink::new(smtp.clone(), recipients) {
                    Ok(sink) => self.run_sink(&sink, event, classification).await,
                    Err(e) => error!(error = %e, sink = "email", "failed to build sink"),
                },
                None => warn!(error = %SinkError::NotConfigured("email"), "skipping email"),
            }
        }

        if plan.webhook {
            // options.url is Some when plan.webhook is set.
            let url = options.url.as_deref().unwrap_or_default();
            match WebhookSink::new(url) {
                Ok(sink) => self.run_sink(&sink, event, classification).await,
                Err(e) => error!(error = %e, sink = "webhook", "failed to build sink"),
            }
        }
    }

    async fn run_sink<S: Sink>(&self, sink: &S, event: &Event, classification: Classification) {
        match sink.send(event, classification).await {
            Ok(()) => debug!(sink = %sink.name(), "event delivered"),
            Err(e) => error!(sink = %sink.name(), error = %e, "failed to deliver event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ProcessIdentity, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_event(severity: Severity) -> Event {
        let identity = ProcessIdentity::new("web01.example.org", 60, "check_disk");
        Event::new(&identity, severity, "disk 91% full")
    }

    fn everything_on() -> AlertOptions {
        AlertOptions::new()
            .with_page()
            .with_email(vec!["oncall@example.org".to_string()])
            .with_url("https://alerts.example.org/ingest")
    }

    #[test]
    fn test_plan_on_transition() {
        let plan = plan(Classification::Transitioned, &everything_on());
        assert!(plan.page);
        assert!(plan.email);
        assert!(plan.webhook);
    }

    #[test]
    fn test_plan_unchanged_only_webhook() {
        let plan = plan(Classification::Unchanged, &everything_on());
        assert!(!plan.page);
        assert!(!plan.email);
        assert!(plan.webhook);
    }

    #[test]
    fn test_plan_first_observation_only_webhook() {
        // First run of a check never pages or emails.
        let plan = plan(Classification::FirstObservation, &everything_on());
        assert!(!plan.page);
        assert!(!plan.email);
        assert!(plan.webhook);
    }

    #[test]
    fn test_plan_nothing_requested() {
        let plan = plan(Classification::Transitioned, &AlertOptions::new());
        assert!(!plan.page);
        assert!(!plan.email);
        assert!(!plan.webhook);
    }

    #[tokio::test]
    async fn test_deliver_with_no_channels_configured() {
        // Paging requested but no pager key: logged, skipped, no panic.
        let fanout = SinkFanout::new(None, None);
        let event = test_event(Severity::Failure);
        fanout
            .deliver(&event, Classification::Transitioned, &everything_on())
            .await;
    }

    #[tokio::test]
    async fn test_deliver_full_fanout_in_test_mode() {
        let fanout = SinkFanout::new(
            Some(PagerSink::new("test-routing-key").unwrap()),
            Some(SmtpConfig::default()),
        );
        let event = test_event(Severity::Failure);
        fanout
            .deliver(&event, Classification::Transitioned, &everything_on())
            .await;
    }

    #[tokio::test]
    async fn test_failing_email_does_not_block_other_sinks() {
        // The recipient is unparseable, so the email sink fails mid-fanout;
        // deliver still completes and the webhook still runs afterwards.
        let fanout = SinkFanout::new(
            Some(PagerSink::new("test-routing-key").unwrap()),
            Some(SmtpConfig::default()),
        );
        let options = AlertOptions::new()
            .with_page()
            .with_email(vec!["not an address".to_string()])
            .with_url("https://alerts.example.org/ingest");
        let event = test_event(Severity::Failure);
        fanout
            .deliver(&event, Classification::Transitioned, &options)
            .await;
    }

    /// A mock sink tracking call counts, for exercising the trait surface.
    struct MockSink {
        name: String,
        call_count: AtomicUsize,
        should_fail: bool,
    }

    impl MockSink {
        fn new(name: &str, should_fail: bool) -> Self {
            Self {
                name: name.to_string(),
                call_count: AtomicUsize::new(0),
                should_fail,
            }
        }

        fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sink for MockSink {
        async fn send(
            &self,
            _event: &Event,
            _classification: Classification,
        ) -> Result<(), SinkError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(SinkError::SendFailed("mock failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn test_run_sink_swallows_failures() {
        let fanout = SinkFanout::new(None, None);
        let failing = MockSink::new("failing", true);
        let event = test_event(Severity::Warning);

        fanout
            .run_sink(&failing, &event, Classification::Transitioned)
            .await;
        assert_eq!(failing.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_sink_invokes_send() {
        let fanout = SinkFanout::new(None, None);
        let sink = MockSink::new("mock", false);
        let event = test_event(Severity::Ok);

        fanout
            .run_sink(&sink, &event, Classification::Unchanged)
            .await;
        fanout
            .run_sink(&sink, &event, Classification::Unchanged)
            .await;
        assert_eq!(sink.call_count(), 2);
    }
}

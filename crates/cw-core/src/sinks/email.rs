//! Email delivery over SMTP.
//!
//! One message per recipient; the body is the event's JSON payload so a
//! mailbox rule can parse it the same way a webhook consumer would.

use super::{Sink, SinkError};
use crate::event::Event;
use crate::transition::Classification;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

/// SMTP endpoint and sender identity.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub server: String,
    /// SMTP port.
    pub port: u16,
    /// Whether to negotiate STARTTLS.
    pub use_starttls: bool,
    /// Optional SMTP username.
    pub username: Option<String>,
    /// Optional SMTP password.
    pub password: Option<String>,
    /// From address on outgoing mail.
    pub from_address: String,
}

impl SmtpConfig {
    /// Creates a configuration for the given server.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: 25,
            use_starttls: false,
            username: None,
            password: None,
            from_address: "checkward@localhost".to_string(),
        }
    }

    /// Sets the SMTP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables STARTTLS.
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Sets SMTP credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the From address.
    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// A sink that mails the event to a list of recipients.
pub struct EmailSink {
    config: SmtpConfig,
    recipients: Vec<String>,
}

impl EmailSink {
    /// Creates an email sink for the given recipients.
    pub fn new(config: SmtpConfig, recipients: Vec<String>) -> Result<Self, SinkError> {
        if recipients.is_empty() {
            return Err(SinkError::InvalidConfig(
                "email recipient list cannot be empty".to_string(),
            ));
        }
        Ok(Self { config, recipients })
    }

    fn subject(event: &Event) -> String {
        format!(
            "[checkward] {} {} {}: {}",
            event.severity.as_str().to_uppercase(),
            event.host,
            event.plugin,
            event.message
        )
    }

    fn build_message(&self, event: &Event, recipient: &str) -> Result<Message, SinkError> {
        let body = serde_json::to_string_pretty(event)
            .map_err(|e| SinkError::SendFailed(format!("failed to encode event: {}", e)))?;

        Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| SinkError::InvalidConfig(format!("invalid from address: {}", e)))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| SinkError::InvalidConfig(format!("invalid recipient: {}", e)))?)
            .subject(Self::subject(event))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| SinkError::SendFailed(format!("failed to build email: {}", e)))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SinkError> {
        let builder = if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server).map_err(
                |e| SinkError::InvalidConfig(format!("failed to create SMTP transport: {}", e)),
            )?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.server)
        };

        let builder = builder.port(self.config.port);
        let builder = match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    #[cfg(not(test))]
    async fn deliver_all(&self, event: &Event) -> Result<(), SinkError> {
        let transport = self.transport()?;
        for recipient in &self.recipients {
            let email = self.build_message(event, recipient)?;
            transport
                .send(email)
                .await
                .map_err(|e| SinkError::SendFailed(format!("failed to send email: {}", e)))?;
            debug!(recipient = %recipient, "email sent");
        }
        Ok(())
    }

    /// Mock delivery for testing: builds every message but sends nothing.
    #[cfg(test)]
    async fn deliver_all(&self, event: &Event) -> Result<(), SinkError> {
        for recipient in &self.recipients {
            let _ = self.build_message(event, recipient)?;
            debug!(recipient = %recipient, "email built");
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for EmailSink {
    #[instrument(skip(self, event), fields(host = %event.host, plugin = %event.plugin))]
    async fn send(
        &self,
        event: &Event,
        _classification: Classification,
    ) -> Result<(), SinkError> {
        self.deliver_all(event).await
    }

    fn name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ProcessIdentity, Severity};

    fn test_event(severity: Severity) -> Event {
        let identity = ProcessIdentity::new("web01.example.org", 60, "check_disk");
        Event::new(&identity, severity, "disk 91% full")
    }

    #[test]
    fn test_smtp_config_defaults() {
        let config = SmtpConfig::default();
        assert_eq!(config.server, "localhost");
        assert_eq!(config.port, 25);
        assert!(!config.use_starttls);
        assert_eq!(config.from_address, "checkward@localhost");
    }

    #[test]
    fn test_smtp_config_builder() {
        let config = SmtpConfig::new("mail.example.org")
            .with_port(587)
            .with_starttls()
            .with_credentials("checkward", "hunter2")
            .with_from_address("alerts@example.org");

        assert_eq!(config.server, "mail.example.org");
        assert_eq!(config.port, 587);
        assert!(config.use_starttls);
        assert_eq!(config.username.as_deref(), Some("checkward"));
        assert_eq!(config.from_address, "alerts@example.org");
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let result = EmailSink::new(SmtpConfig::default(), vec![]);
        assert!(matches!(result, Err(SinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_subject_format() {
        let event = test_event(Severity::Failure);
        assert_eq!(
            EmailSink::subject(&event),
            "[checkward] FAILURE web01 check_disk: disk 91% full"
        );
    }

    #[test]
    fn test_body_is_event_json() {
        let sink = EmailSink::new(
            SmtpConfig::default(),
            vec!["oncall@example.org".to_string()],
        )
        .unwrap();
        let event = test_event(Severity::Warning);

        let message = sink.build_message(&event, "oncall@example.org").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("\"plugin\": \"check_disk\""));
        assert!(raw.contains("\"severity\": \"warning\""));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let sink = EmailSink::new(
            SmtpConfig::default(),
            vec!["not an address".to_string()],
        )
        .unwrap();
        let event = test_event(Severity::Ok);

        let result = sink.build_message(&event, "not an address");
        assert!(matches!(result, Err(SinkError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_send_builds_one_message_per_recipient() {
        let sink = EmailSink::new(
            SmtpConfig::default(),
            vec![
                "oncall@example.org".to_string(),
                "backup@example.org".to_string(),
            ],
        )
        .unwrap();

        let result = sink
            .send(&test_event(Severity::Failure), Classification::Transitioned)
            .await;
        assert!(result.is_ok());
        assert_eq!(sink.name(), "email");
    }
}

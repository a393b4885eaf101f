//! Alert dispatch orchestration.
//!
//! The [`Dispatcher`] runs the full pipeline for one check result: build the
//! event, consult suppression, verify the state store, classify the severity
//! transition, record the new state, and fan out to sinks. Sink failures are
//! logged and swallowed; only a broken state store surfaces to the caller,
//! because without usable state the transition classification would lie.

use crate::event::{Event, ParseSeverityError, ProcessIdentity, Severity};
use crate::sinks::{PagerSink, SinkFanout, SmtpConfig};
use crate::state::{FileStateStore, StateError, StateStore};
use crate::suppress::{SuppressionConfig, SuppressionError, SuppressionOracle, SuppressionPolicy};
use crate::transition::{classify, Classification};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Errors surfaced to the check that raised the alert.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A severity string could not be parsed.
    #[error(transparent)]
    InvalidSeverity(#[from] ParseSeverityError),

    /// The state store is unusable or failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// The suppression backend could not be set up.
    #[error(transparent)]
    Suppression(#[from] SuppressionError),

    /// A sink is misconfigured at construction time.
    #[error("sink configuration rejected: {0}")]
    SinkConfig(String),
}

/// Per-call delivery options.
///
/// Everything defaults to off; the expected steady state is URL-only, with
/// every check result POSTed to a decision engine that does the real
/// alerting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertOptions {
    /// Page on a severity transition.
    pub page: bool,
    /// Recipients to email on a severity transition.
    pub email: Option<Vec<String>>,
    /// URL to POST the event to on every dispatch.
    pub url: Option<String>,
}

impl AlertOptions {
    /// Creates options with every channel off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests paging.
    pub fn with_page(mut self) -> Self {
        self.page = true;
        self
    }

    /// Requests email to the given recipients.
    pub fn with_email(mut self, recipients: Vec<String>) -> Self {
        self.email = Some(recipients);
        self
    }

    /// Requests a webhook POST to the given URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Static configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Directory for per-plugin state files.
    pub state_dir: PathBuf,
    /// Pager service routing key; paging is unavailable without it.
    pub pager_key: Option<String>,
    /// Suppression backend; alerts always proceed without it.
    pub suppression: Option<SuppressionConfig>,
    /// SMTP endpoint; email is unavailable without it.
    pub smtp: Option<SmtpConfig>,
}

impl DispatchConfig {
    /// Creates a configuration with the default state directory and no
    /// optional channels.
    pub fn new() -> Self {
        Self {
            state_dir: PathBuf::from("/tmp"),
            pager_key: None,
            suppression: None,
            smtp: None,
        }
    }

    /// Sets the state directory.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Sets the pager routing key.
    pub fn with_pager_key(mut self, key: impl Into<String>) -> Self {
        self.pager_key = Some(key.into());
        self
    }

    /// Enables the suppression backend.
    pub fn with_suppression(mut self, config: SuppressionConfig) -> Self {
        self.suppression = Some(config);
        self
    }

    /// Enables email delivery through the given SMTP endpoint.
    pub fn with_smtp(mut self, config: SmtpConfig) -> Self {
        self.smtp = Some(config);
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event went through the pipeline; delivery was attempted per
    /// policy with the given classification.
    Delivered(Classification),
    /// Alerting is suppressed for this host/plugin; nothing was sent and no
    /// state was recorded.
    Suppressed,
}

/// Dispatches check results to the configured channels.
pub struct Dispatcher {
    identity: ProcessIdentity,
    store: Arc<dyn StateStore>,
    oracle: Option<SuppressionOracle>,
    fanout: SinkFanout,
}

impl Dispatcher {
    /// Creates a dispatcher, resolving the process identity from the
    /// environment.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        Self::with_identity(config, ProcessIdentity::resolve())
    }

    /// Creates a dispatcher with an explicit identity.
    pub fn with_identity(
        config: DispatchConfig,
        identity: ProcessIdentity,
    ) -> Result<Self, DispatchError> {
        let pager = match &config.pager_key {
            Some(key) => Some(
                PagerSink::new(key.clone()).map_err(|e| DispatchError::SinkConfig(e.to_string()))?,
            ),
            None => None,
        };

        let oracle = match &config.suppression {
            Some(suppression) => Some(SuppressionOracle::new(suppression.clone())?),
            None => None,
        };

        Ok(Self {
            identity,
            store: Arc::new(FileStateStore::new(config.state_dir)),
            oracle,
            fanout: SinkFanout::new(pager, config.smtp),
        })
    }

    /// Replaces the state store. The default is a file-per-plugin store
    /// under the configured state directory.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Returns the identity this dispatcher reports as.
    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// Reports an ok result.
    pub async fn ok(
        &self,
        message: impl Into<String>,
        options: &AlertOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(Severity::Ok, message, options).await
    }

    /// Reports a warning.
    pub async fn warning(
        &self,
        message: impl Into<String>,
        options: &AlertOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(Severity::Warning, message, options).await
    }

    /// Reports a failure.
    pub async fn failure(
        &self,
        message: impl Into<String>,
        options: &AlertOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch(Severity::Failure, message, options).await
    }

    /// Runs the dispatch pipeline for one check result.
    #[instrument(skip(self, message, options), fields(plugin = %self.identity.plugin, severity = %severity))]
    pub async fn dispatch(
        &self,
        severity: Severity,
        message: impl Into<String>,
        options: &AlertOptions,
    ) -> Result<DispatchOutcome, DispatchError> {
        let event = Event::new(&self.identity, severity, message);

        if let Some(oracle) = &self.oracle {
            match oracle.is_suppressed(&event.host, &event.plugin).await {
                Ok(true) => {
                    info!(
                        host = %event.host,
                        plugin = %event.plugin,
                        "alerting disabled, suppressing alert"
                    );
                    return Ok(DispatchOutcome::Suppressed);
                }
                Ok(false) => {}
                Err(e) => match oracle.policy() {
                    SuppressionPolicy::FailOpen => {
                        warn!(
                            host = %event.host,
                            plugin = %event.plugin,
                            error = %e,
                            "suppression lookup failed, proceeding"
                        );
                    }
                    SuppressionPolicy::FailClosed => {
                        warn!(
                            host = %event.host,
                            plugin = %event.plugin,
                            error = %e,
                            "suppression lookup failed, suppressing"
                        );
                        return Ok(DispatchOutcome::Suppressed);
                    }
                },
            }
        }

        // A broken store aborts before any delivery: alerting on a guessed
        // classification is worse than not alerting.
        self.store.ensure_usable().await?;

        let previous = self.store.read(&event.plugin).await?;
        let classification = classify(previous.as_deref(), &event.severity);

        // Recorded unconditionally, so the next run compares against what
        // actually happened even when nothing is delivered now.
        self.store.write(&event.plugin, &event.severity).await?;

        self.fanout.deliver(&event, classification, options).await;

        Ok(DispatchOutcome::Delivered(classification))
    }
}

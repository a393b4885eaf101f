//! Alert suppression backed by redis.
//!
//! Operators silence alerting by writing redis keys: the key `global`
//! silences hosts fleet-wide, a key named after a short hostname silences
//! that host. The value is `*` for everything, or a list of plugin names.
//!
//! The lookup is bounded to a hard timeout so a dead redis server cannot
//! stall a check run. What happens when the lookup fails is an explicit
//! policy choice, not an accident of control flow.

use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Errors from the suppression backend.
#[derive(Error, Debug)]
pub enum SuppressionError {
    /// Could not build or use the connection pool.
    #[error("redis connection failed: {0}")]
    Connection(String),

    /// The GET itself failed.
    #[error("redis lookup failed: {0}")]
    Lookup(String),

    /// The lookup did not complete within the configured bound.
    #[error("suppression lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// What to do when the suppression backend cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionPolicy {
    /// Deliver the alert anyway. A monitoring pipeline that goes silent
    /// because redis is down is worse than a few duplicate alerts.
    #[default]
    FailOpen,
    /// Treat the alert as suppressed.
    FailClosed,
}

/// Configuration for the suppression oracle.
#[derive(Debug, Clone)]
pub struct SuppressionConfig {
    /// Redis connection URL (e.g. "redis://localhost:6379").
    pub url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Hard bound on the whole lookup.
    pub lookup_timeout: Duration,
    /// Behavior when the lookup fails or times out.
    pub policy: SuppressionPolicy,
}

impl SuppressionConfig {
    /// Creates a configuration with the given redis URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 4,
            lookup_timeout: Duration::from_secs(2),
            policy: SuppressionPolicy::default(),
        }
    }

    /// Sets the maximum number of pooled connections.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the lookup timeout.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: SuppressionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self::new("redis://localhost:6379")
    }
}

/// Answers "is alerting suppressed for this host and plugin?".
pub struct SuppressionOracle {
    pool: Pool,
    config: SuppressionConfig,
}

impl SuppressionOracle {
    /// Creates an oracle. The pool is built lazily; no connection is made
    /// until the first lookup.
    pub fn new(config: SuppressionConfig) -> Result<Self, SuppressionError> {
        let pool = PoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| SuppressionError::Connection(format!("failed to create pool: {}", e)))?
            .max_size(config.max_connections as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| SuppressionError::Connection(format!("failed to build pool: {}", e)))?;

        Ok(Self { pool, config })
    }

    /// Returns the configured failure policy.
    pub fn policy(&self) -> SuppressionPolicy {
        self.config.policy
    }

    /// Checks whether alerting is suppressed for the given host and plugin.
    ///
    /// Consults the `global` key first, then the host key. The whole lookup
    /// is bounded by the configured timeout.
    #[instrument(skip(self))]
    pub async fn is_suppressed(&self, host: &str, plugin: &str) -> Result<bool, SuppressionError> {
        tokio::time::timeout(self.config.lookup_timeout, self.lookup(host, plugin))
            .await
            .map_err(|_| SuppressionError::Timeout(self.config.lookup_timeout))?
    }

    async fn lookup(&self, host: &str, plugin: &str) -> Result<bool, SuppressionError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| SuppressionError::Connection(format!("failed to get connection: {}", e)))?;

        let global: Option<String> = conn
            .get("global")
            .await
            .map_err(|e| SuppressionError::Lookup(format!("GET global failed: {}", e)))?;
        if let Some(value) = global {
            if value_suppresses(&value, plugin) {
                return Ok(true);
            }
        }

        let host_acks: Option<String> = conn
            .get(host)
            .await
            .map_err(|e| SuppressionError::Lookup(format!("GET {} failed: {}", host, e)))?;
        Ok(host_acks
            .map(|value| value_suppresses(&value, plugin))
            .unwrap_or(false))
    }
}

impl std::fmt::Debug for SuppressionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionOracle")
            .field("url", &self.config.url)
            .field("policy", &self.config.policy)
            .finish()
    }
}

/// Returns true when a suppression value covers the given plugin.
///
/// `*` anywhere in the value suppresses everything; otherwise the value is a
/// comma- or whitespace-delimited plugin list.
fn value_suppresses(value: &str, plugin: &str) -> bool {
    value.contains('*')
        || value
            .split(|c: char| c == ',' || c.is_whitespace())
            .any(|entry| entry == plugin)
}

//! Reachability probing with caller-controlled retry.
//!
//! [`ConnectionProbe`] answers one question: can a session to this server be
//! opened within the connect timeout? It never runs a query. The collector
//! reuses its connect-with-retry step so both share one retry policy.

use crate::Result;
use crate::adapters::{ReplicaConnector, ReplicaSession, close_session};
use crate::config::CheckConfig;
use crate::error::ReplCheckError;
use crate::models::ServerDescriptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What the caller is told when a connection attempt fails.
#[derive(Debug)]
pub struct RetryContext<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Failed attempts so far, starting at 1
    pub attempt: u32,
    pub error: &'a ReplCheckError,
}

/// Caller-supplied decision on whether to try again.
pub type RetryDecider = Arc<dyn Fn(&RetryContext<'_>) -> bool + Send + Sync>;

/// Policy applied after a failed connection attempt.
///
/// Declining a retry, or running out of retries, ends the attempt: the
/// server is reported unreachable and no further connection is made.
#[derive(Clone, Default)]
pub enum RetryPolicy {
    /// Fail on the first error
    #[default]
    NoRetry,
    /// Retry up to `n` more times
    RetryNTimes(u32),
    /// Ask the caller after every failure
    AskCaller(RetryDecider),
}

impl RetryPolicy {
    /// Builds an [`RetryPolicy::AskCaller`] policy from a closure.
    pub fn ask_caller<F>(decider: F) -> Self
    where
        F: Fn(&RetryContext<'_>) -> bool + Send + Sync + 'static,
    {
        RetryPolicy::AskCaller(Arc::new(decider))
    }

    /// Whether another attempt should be made after `context.attempt` failures.
    pub fn should_retry(&self, context: &RetryContext<'_>) -> bool {
        match self {
            RetryPolicy::NoRetry => false,
            RetryPolicy::RetryNTimes(retries) => context.attempt <= *retries,
            RetryPolicy::AskCaller(decider) => decider(context),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryPolicy::NoRetry => write!(f, "NoRetry"),
            RetryPolicy::RetryNTimes(n) => write!(f, "RetryNTimes({})", n),
            RetryPolicy::AskCaller(_) => write!(f, "AskCaller(..)"),
        }
    }
}

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum ProbeResult {
    Reachable,
    Unreachable(String),
}

impl ProbeResult {
    /// True for `Reachable`.
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeResult::Reachable)
    }
}

/// Opens and immediately closes connections to test reachability.
#[derive(Clone)]
pub struct ConnectionProbe {
    connector: Arc<dyn ReplicaConnector>,
    connect_timeout: Duration,
    retry: RetryPolicy,
    retry_delay: Duration,
}

impl std::fmt::Debug for ConnectionProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProbe")
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl ConnectionProbe {
    /// Creates a probe using the connect timeout and retry settings of `config`.
    pub fn new(connector: Arc<dyn ReplicaConnector>, config: &CheckConfig) -> Self {
        Self {
            connector,
            connect_timeout: config.connect_timeout,
            retry: config.retry.clone(),
            retry_delay: config.retry_delay,
        }
    }

    /// Creates a probe backed by the sqlx MySQL connector.
    #[cfg(feature = "mysql")]
    pub fn mysql(config: &CheckConfig) -> Self {
        Self::new(Arc::new(crate::adapters::mysql::MySqlConnector::new()), config)
    }

    /// Connect timeout applied to each attempt.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Checks that `server` accepts a connection.
    ///
    /// Never fails: every error, including a timeout, becomes
    /// [`ProbeResult::Unreachable`] carrying the error text.
    pub async fn probe(&self, server: &ServerDescriptor) -> ProbeResult {
        match self.open(server).await {
            Ok(session) => {
                close_session(session, &server.endpoint()).await;
                debug!("{} is reachable", server.endpoint());
                ProbeResult::Reachable
            }
            Err(e) => ProbeResult::Unreachable(e.to_string()),
        }
    }

    /// Opens a session, applying the timeout to each attempt and the retry
    /// policy between attempts.
    ///
    /// # Errors
    /// Returns the last connection-phase error once the policy stops
    /// retrying. A declined `AskCaller` retry is reported as
    /// [`ReplCheckError::RetryDeclined`].
    pub async fn open(&self, server: &ServerDescriptor) -> Result<Box<dyn ReplicaSession>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match self.connect_once(server).await {
                Ok(session) => return Ok(session),
                Err(e) => e,
            };

            let context = RetryContext {
                host: &server.host,
                port: server.port,
                attempt,
                error: &error,
            };
            if !self.retry.should_retry(&context) {
                return Err(match self.retry {
                    RetryPolicy::AskCaller(_) => ReplCheckError::RetryDeclined {
                        target: server.endpoint(),
                        attempts: attempt,
                        last_error: error.to_string(),
                    },
                    _ => error,
                });
            }

            warn!(
                "Connection attempt {} to {} failed, retrying: {}",
                attempt,
                server.endpoint(),
                error
            );
            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }

    async fn connect_once(&self, server: &ServerDescriptor) -> Result<Box<dyn ReplicaSession>> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(server)).await {
            Ok(result) => result,
            // The pending connect future is dropped here, releasing any
            // half-open socket before the timeout is reported.
            Err(_) => Err(ReplCheckError::connection_timeout(
                server.endpoint(),
                self.connect_timeout,
            )),
        }
    }
}

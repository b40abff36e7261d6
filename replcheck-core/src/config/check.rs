//! Collection pass configuration.

use crate::probe::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default connect timeout, matching the five seconds interactive tools use.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default status query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Default pause between connection retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for either timeout.
const MAX_TIMEOUT: Duration = Duration::from_secs(300);
/// Upper bound for concurrent server checks.
const MAX_IN_FLIGHT: usize = 64;

/// Administrative statement used to read replica status.
///
/// Both statements return the same column order; only the column names
/// differ between the legacy and the renamed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusQuery {
    /// `SHOW SLAVE STATUS`, understood by every MySQL and MariaDB release
    #[default]
    Slave,
    /// `SHOW REPLICA STATUS`, MySQL 8.0.22 and later
    Replica,
}

impl StatusQuery {
    /// SQL text for this statement.
    pub fn sql(self) -> &'static str {
        match self {
            StatusQuery::Slave => "SHOW SLAVE STATUS",
            StatusQuery::Replica => "SHOW REPLICA STATUS",
        }
    }
}

/// How servers within one pass are scheduled.
///
/// Both modes deliver outcomes in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectMode {
    /// One server at a time; each connection is closed before the next opens
    #[default]
    Sequential,
    /// Up to `max_in_flight` servers checked at once
    Concurrent { max_in_flight: usize },
}

impl CollectMode {
    /// Builds a mode from a concurrency count; 0 and 1 mean sequential.
    pub fn with_concurrency(max_in_flight: usize) -> Self {
        if max_in_flight <= 1 {
            CollectMode::Sequential
        } else {
            CollectMode::Concurrent { max_in_flight }
        }
    }

    /// Number of servers checked at once.
    pub fn max_in_flight(self) -> usize {
        match self {
            CollectMode::Sequential => 1,
            CollectMode::Concurrent { max_in_flight } => max_in_flight.max(1),
        }
    }
}

/// Settings shared by the probe and the collector.
///
/// # Example
/// ```rust
/// use replcheck_core::config::{CheckConfig, CollectMode, StatusQuery};
/// use replcheck_core::probe::RetryPolicy;
/// use std::time::Duration;
///
/// let config = CheckConfig::new()
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_retry(RetryPolicy::RetryNTimes(2))
///     .with_mode(CollectMode::with_concurrency(4))
///     .with_status_query(StatusQuery::Replica);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Bound on each connection attempt
    pub connect_timeout: Duration,
    /// Bound on each query on an open connection
    pub query_timeout: Duration,
    /// What to do when a connection attempt fails
    pub retry: RetryPolicy,
    /// Pause between connection attempts
    pub retry_delay: Duration,
    /// Sequential or concurrent scheduling
    pub mode: CollectMode,
    /// Which status statement to issue
    pub status_query: StatusQuery,
    /// Read `VERSION()` before the status query
    pub fetch_server_version: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            retry: RetryPolicy::NoRetry,
            retry_delay: DEFAULT_RETRY_DELAY,
            mode: CollectMode::Sequential,
            status_query: StatusQuery::Slave,
            fetch_server_version: true,
        }
    }
}

impl CheckConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates configuration values.
    ///
    /// # Errors
    /// Returns error for zero or excessive timeouts, an out-of-range
    /// concurrency, or an interactive retry policy combined with concurrent
    /// checks (prompts from parallel checks would interleave).
    pub fn validate(&self) -> crate::Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(crate::error::ReplCheckError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(crate::error::ReplCheckError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        if self.connect_timeout > MAX_TIMEOUT || self.query_timeout > MAX_TIMEOUT {
            return Err(crate::error::ReplCheckError::configuration(format!(
                "timeouts should not exceed {}s",
                MAX_TIMEOUT.as_secs()
            )));
        }

        if self.mode.max_in_flight() > MAX_IN_FLIGHT {
            return Err(crate::error::ReplCheckError::configuration(format!(
                "concurrency should not exceed {}",
                MAX_IN_FLIGHT
            )));
        }

        if matches!(self.retry, RetryPolicy::AskCaller(_)) && self.mode != CollectMode::Sequential
        {
            return Err(crate::error::ReplCheckError::configuration(
                "interactive retry requires sequential collection",
            ));
        }

        Ok(())
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Builder method to set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder method to set the delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Builder method to set the scheduling mode.
    pub fn with_mode(mut self, mode: CollectMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to choose the status statement.
    pub fn with_status_query(mut self, status_query: StatusQuery) -> Self {
        self.status_query = status_query;
        self
    }

    /// Builder method to toggle the `VERSION()` lookup.
    pub fn with_server_version(mut self, fetch: bool) -> Self {
        self.fetch_server_version = fetch;
        self
    }
}

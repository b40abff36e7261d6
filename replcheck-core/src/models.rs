//! Core data models for replication status collection.
//!
//! Everything here except [`ServerDescriptor`] is serializable and free of
//! credentials, so outcomes and reports can be written to JSON as-is.

use crate::security::Credentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default MySQL server port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection details for one server in the topology.
///
/// Two descriptors with identical fields are interchangeable. `Debug` and
/// `Display` never include the password.
///
/// # Example
/// ```rust
/// use replcheck_core::ServerDescriptor;
///
/// let server = ServerDescriptor::new("db1", "repl", "secret", "app").with_port(3307);
/// assert_eq!(server.endpoint(), "db1:3307");
/// assert!(!format!("{:?}", server).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Default database for the session (may be empty)
    pub database: String,
    credentials: Credentials,
}

impl ServerDescriptor {
    /// Creates a descriptor on the default MySQL port.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MYSQL_PORT,
            database: database.into(),
            credentials: Credentials::new(user.into(), password.into()),
        }
    }

    /// Builder method to set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to replace the password.
    pub fn with_password(mut self, password: String) -> Self {
        self.credentials = self.credentials.with_password(password);
        self
    }

    /// User name used to authenticate.
    pub fn user(&self) -> &str {
        self.credentials.username()
    }

    /// Credentials for the connection layer.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Whether a password was supplied.
    pub fn has_password(&self) -> bool {
        self.credentials.has_password()
    }

    /// `host:port`, the only identity used in logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates descriptor fields.
    ///
    /// # Errors
    /// Returns a configuration error for an empty host or user, or port 0.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(crate::error::ReplCheckError::configuration(
                "server host cannot be empty",
            ));
        }
        if self.user().is_empty() {
            return Err(crate::error::ReplCheckError::configuration(format!(
                "user for {} cannot be empty",
                self.endpoint()
            )));
        }
        if self.port == 0 {
            return Err(crate::error::ReplCheckError::configuration(format!(
                "port for {} must be greater than 0",
                self.host
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl std::fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if !self.database.is_empty() {
            write!(f, "/{}", self.database)?;
        }
        Ok(())
    }
}

/// Which leg of the topology a pass covers.
///
/// The label only titles and groups results; the status mapping is the same
/// for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyLabel {
    /// Main server plus every node
    MainToNode,
    /// Nodes only, for chained replication
    NodeToNode,
}

impl std::fmt::Display for TopologyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyLabel::MainToNode => write!(f, "main → node"),
            TopologyLabel::NodeToNode => write!(f, "node → node"),
        }
    }
}

/// Replication thread state as reported by the server.
///
/// The server reports text, not a boolean: besides `Yes` and `No` an I/O
/// thread can be `Connecting`, and future servers may add states. Unknown
/// values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ThreadState {
    Yes,
    No,
    Connecting,
    Other(String),
}

impl ThreadState {
    /// True only for `Yes`.
    pub fn is_running(&self) -> bool {
        matches!(self, ThreadState::Yes)
    }

    /// Server text for this state.
    pub fn as_str(&self) -> &str {
        match self {
            ThreadState::Yes => "Yes",
            ThreadState::No => "No",
            ThreadState::Connecting => "Connecting",
            ThreadState::Other(text) => text,
        }
    }
}

impl From<&str> for ThreadState {
    fn from(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("yes") => ThreadState::Yes,
            v if v.eq_ignore_ascii_case("no") => ThreadState::No,
            v if v.eq_ignore_ascii_case("connecting") => ThreadState::Connecting,
            other => ThreadState::Other(other.to_string()),
        }
    }
}

impl From<String> for ThreadState {
    fn from(value: String) -> Self {
        ThreadState::from(value.as_str())
    }
}

impl From<ThreadState> for String {
    fn from(value: ThreadState) -> Self {
        match value {
            ThreadState::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replication status of one replica, parsed from the first status row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationStatusRecord {
    pub host: String,
    pub io_thread_running: ThreadState,
    pub sql_thread_running: ThreadState,
    pub read_source_log_position: u64,
    pub relay_log_file: String,
    pub relay_log_position: u64,
    pub io_thread_state: String,
    /// Empty when the replica reports no error
    pub last_error: String,
    pub has_replication_data: bool,
    /// `VERSION()` of the server, when it could be read
    pub server_version: Option<String>,
}

/// What happened when one server was checked. Exactly one per descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ServerOutcome {
    /// No connection could be established
    Unreachable { host: String, reason: String },
    /// Connected, but the status query or its parsing failed
    QueryFailed { host: String, reason: String },
    /// The server is a replica and reported status
    Status(ReplicationStatusRecord),
    /// The server answered with no status rows: it is not a replica
    NoReplicationConfigured {
        host: String,
        /// `VERSION()` of the server, when it could be read
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_version: Option<String>,
    },
}

impl ServerOutcome {
    /// Host this outcome belongs to.
    pub fn host(&self) -> &str {
        match self {
            ServerOutcome::Unreachable { host, .. }
            | ServerOutcome::QueryFailed { host, .. }
            | ServerOutcome::NoReplicationConfigured { host, .. } => host,
            ServerOutcome::Status(record) => &record.host,
        }
    }

    /// True for `Unreachable` and `QueryFailed`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ServerOutcome::Unreachable { .. } | ServerOutcome::QueryFailed { .. }
        )
    }

    /// `VERSION()` of a server that answered, when it could be read.
    pub fn server_version(&self) -> Option<&str> {
        match self {
            ServerOutcome::Status(record) => record.server_version.as_deref(),
            ServerOutcome::NoReplicationConfigured { server_version, .. } => {
                server_version.as_deref()
            }
            ServerOutcome::Unreachable { .. } | ServerOutcome::QueryFailed { .. } => None,
        }
    }
}

/// Counts for one finished (or interrupted) collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub topology: TopologyLabel,
    /// Number of descriptors handed to the pass
    pub total: usize,
    pub status: usize,
    pub not_configured: usize,
    pub unreachable: usize,
    pub query_failed: usize,
    /// The pass was cancelled before every server was checked
    pub cancelled: bool,
    /// The worker stopped without finishing, e.g. it panicked
    pub interrupted: bool,
}

impl PassSummary {
    /// Empty summary for a pass over `total` servers.
    pub fn new(topology: TopologyLabel, total: usize) -> Self {
        Self {
            topology,
            total,
            status: 0,
            not_configured: 0,
            unreachable: 0,
            query_failed: 0,
            cancelled: false,
            interrupted: false,
        }
    }

    /// Builds a summary from a complete outcome list.
    pub fn from_outcomes(topology: TopologyLabel, outcomes: &[ServerOutcome]) -> Self {
        let mut summary = Self::new(topology, outcomes.len());
        outcomes.iter().for_each(|outcome| summary.record(outcome));
        summary
    }

    /// Counts one outcome.
    pub fn record(&mut self, outcome: &ServerOutcome) {
        match outcome {
            ServerOutcome::Unreachable { .. } => self.unreachable += 1,
            ServerOutcome::QueryFailed { .. } => self.query_failed += 1,
            ServerOutcome::Status(_) => self.status += 1,
            ServerOutcome::NoReplicationConfigured { .. } => self.not_configured += 1,
        }
    }

    /// Outcomes counted so far.
    pub fn reported(&self) -> usize {
        self.status + self.not_configured + self.unreachable + self.query_failed
    }

    /// True when any server was unreachable or failed, or the pass stopped early.
    pub fn has_failures(&self) -> bool {
        self.unreachable > 0 || self.query_failed > 0 || self.interrupted
    }
}

/// Full record of one pass, as written to JSON reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub topology: TopologyLabel,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ServerOutcome>,
    pub summary: PassSummary,
}

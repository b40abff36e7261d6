//! Connection traits between the collector and a database driver.
//!
//! The collector never talks to a driver directly. It asks a
//! [`ReplicaConnector`] for a [`ReplicaSession`], runs its queries through
//! the session and closes it. Tests plug in instrumented connectors; the
//! `mysql` feature provides the real one on top of sqlx.
//!
//! # Contract
//! - `connect` failures are connection-phase errors
//!   ([`ReplCheckError::is_connection_phase`] is true)
//! - session query failures are not
//! - `close` is idempotent and is called exactly once per opened session by
//!   the probe and the collector
//!
//! [`ReplCheckError::is_connection_phase`]: crate::error::ReplCheckError::is_connection_phase

#[cfg(feature = "mysql")]
pub mod mysql;

use crate::Result;
use crate::config::StatusQuery;
use crate::models::ServerDescriptor;
use crate::status::StatusRow;
use async_trait::async_trait;

/// Opens sessions to servers.
///
/// # Object Safety
/// Object-safe so the collector can hold an `Arc<dyn ReplicaConnector>`.
#[async_trait]
pub trait ReplicaConnector: Send + Sync {
    /// Opens a session to `server`.
    ///
    /// Timeouts are applied by the caller; implementations may wait
    /// indefinitely.
    ///
    /// # Errors
    /// Returns a connection-phase error if the server cannot be reached or
    /// rejects the credentials.
    async fn connect(&self, server: &ServerDescriptor) -> Result<Box<dyn ReplicaSession>>;
}

/// One open connection, exclusively owned by the step that opened it.
#[async_trait]
pub trait ReplicaSession: Send {
    /// Returns the server's `VERSION()` string.
    async fn server_version(&mut self) -> Result<String>;

    /// Runs the status statement and returns every row.
    ///
    /// An empty vector means the server is not configured as a replica.
    async fn fetch_status_rows(&mut self, query: StatusQuery) -> Result<Vec<StatusRow>>;

    /// Closes the connection. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Closes a session, logging rather than propagating a failed close.
///
/// A failed close does not change a server's outcome: the status was
/// already read (or already failed), and the socket is released either way
/// when the session is dropped.
pub async fn close_session(mut session: Box<dyn ReplicaSession>, endpoint: &str) {
    if let Err(e) = session.close().await {
        tracing::debug!("Closing connection to {} failed: {}", endpoint, e);
    }
}

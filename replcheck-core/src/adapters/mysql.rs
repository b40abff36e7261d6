//! MySQL connector built on sqlx.
//!
//! # Security Guarantees
//! - Only `SHOW ... STATUS` and `SELECT VERSION()` are executed
//! - One dedicated connection per check; no pool, nothing shared between
//!   servers
//! - Errors carry `host:port` only, never the credentials

use super::{ReplicaConnector, ReplicaSession};
use crate::Result;
use crate::config::StatusQuery;
use crate::error::ReplCheckError;
use crate::models::ServerDescriptor;
use crate::status::StatusRow;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Executor, Row, ValueRef};

/// Opens plain (unpooled) MySQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }

    /// Builds driver options for `server`.
    pub fn connect_options(server: &ServerDescriptor) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&server.host)
            .port(server.port)
            .username(server.user());

        let credentials = server.credentials();
        if credentials.has_password() {
            options = options.password(credentials.expose_password());
        }
        if !server.database.is_empty() {
            options = options.database(&server.database);
        }

        options
    }
}

#[async_trait]
impl ReplicaConnector for MySqlConnector {
    async fn connect(&self, server: &ServerDescriptor) -> Result<Box<dyn ReplicaSession>> {
        let endpoint = server.endpoint();
        tracing::trace!("Opening MySQL connection to {}", endpoint);

        let conn = Self::connect_options(server)
            .connect()
            .await
            .map_err(|e| ReplCheckError::connection_failed(endpoint.clone(), e))?;

        Ok(Box::new(MySqlReplicaSession {
            endpoint,
            conn: Some(conn),
        }))
    }
}

/// An open MySQL connection owned by one check.
pub struct MySqlReplicaSession {
    endpoint: String,
    conn: Option<MySqlConnection>,
}

impl std::fmt::Debug for MySqlReplicaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlReplicaSession")
            .field("endpoint", &self.endpoint)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl MySqlReplicaSession {
    fn connection(&mut self) -> Result<&mut MySqlConnection> {
        let endpoint = &self.endpoint;
        self.conn.as_mut().ok_or_else(|| {
            ReplCheckError::query_failed(
                endpoint.clone(),
                std::io::Error::new(std::io::ErrorKind::NotConnected, "connection already closed"),
            )
        })
    }
}

#[async_trait]
impl ReplicaSession for MySqlReplicaSession {
    async fn server_version(&mut self) -> Result<String> {
        let endpoint = self.endpoint.clone();
        let conn = self.connection()?;
        sqlx::query_scalar::<_, String>("SELECT VERSION()")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| ReplCheckError::query_failed(endpoint, e))
    }

    async fn fetch_status_rows(&mut self, query: StatusQuery) -> Result<Vec<StatusRow>> {
        let endpoint = self.endpoint.clone();
        let conn = self.connection()?;

        // Text protocol: SHOW statements are not reliably preparable. Going
        // through `Executor` keeps the future `Send` for the boxed trait method.
        let rows: Vec<MySqlRow> = Executor::fetch_all(&mut *conn, sqlx::raw_sql(query.sql()))
            .await
            .map_err(|e| ReplCheckError::query_failed(endpoint.clone(), e))?;

        tracing::trace!("{} returned {} row(s) on {}", query.sql(), rows.len(), endpoint);

        rows.iter()
            .map(|row| status_row_from_mysql(row, &endpoint))
            .collect()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| ReplCheckError::query_failed(self.endpoint.clone(), e))?;
        }
        Ok(())
    }
}

/// Renders every column of a status row as text.
fn status_row_from_mysql(row: &MySqlRow, endpoint: &str) -> Result<StatusRow> {
    (0..row.len())
        .map(|index| column_text(row, index, endpoint))
        .collect::<Result<Vec<_>>>()
        .map(StatusRow::new)
}

/// Decodes one column as text regardless of its declared type.
///
/// Status rows mix VARCHAR, TEXT and BIGINT UNSIGNED columns, and some
/// servers report binary collations; integers are formatted, anything else
/// falls back to lossy UTF-8 of the raw bytes.
fn column_text(row: &MySqlRow, index: usize, endpoint: &str) -> Result<Option<String>> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ReplCheckError::query_failed(endpoint.to_string(), e))?;
    if raw.is_null() {
        return Ok(None);
    }

    if let Ok(text) = row.try_get::<String, _>(index) {
        return Ok(Some(text));
    }
    if let Ok(value) = row.try_get::<u64, _>(index) {
        return Ok(Some(value.to_string()));
    }
    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(Some(value.to_string()));
    }

    let bytes: Vec<u8> = row
        .try_get_unchecked(index)
        .map_err(|e| ReplCheckError::query_failed(endpoint.to_string(), e))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

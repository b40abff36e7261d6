//! Instrumented connector shared by the collector and probe tests.
//!
//! Each host is scripted with a [`Behavior`]; the connector counts every
//! connect, close and status query so tests can assert on connection
//! lifetimes without a database.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use async_trait::async_trait;
use replcheck_core::config::StatusQuery;
use replcheck_core::status::{StatusColumn, StatusRow};
use replcheck_core::{ReplCheckError, ReplicaConnector, ReplicaSession, Result, ServerDescriptor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted host responds.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Connection refused
    Refuse,
    /// Connect never completes
    Hang,
    /// Connects and returns these status rows
    Rows(Vec<StatusRow>),
    /// Connects, then the status query fails
    QueryError(String),
    /// Connects, then the status query never completes
    QueryHang,
    /// Connects, then the status query panics
    Panic,
}

/// Counters shared between a connector and its sessions.
#[derive(Debug, Default)]
pub struct Counters {
    pub connect_attempts: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub status_queries: AtomicUsize,
    /// Sessions dropped without `close` being called
    pub leaked: AtomicUsize,
    /// Sessions currently open
    pub in_flight: AtomicUsize,
    /// Highest `in_flight` observed
    pub max_in_flight: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    behaviors: HashMap<String, Behavior>,
    pub counters: Arc<Counters>,
    /// Per-host delay before a status query answers
    query_delays: HashMap<String, Duration>,
    /// Hosts in the order their status queries started
    pub query_order: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(host.to_string(), behavior);
        self
    }

    pub fn with_query_delay(mut self, host: &str, delay: Duration) -> Self {
        self.query_delays.insert(host.to_string(), delay);
        self
    }

    pub fn connect_attempts(&self) -> usize {
        Counters::get(&self.counters.connect_attempts)
    }

    pub fn opened(&self) -> usize {
        Counters::get(&self.counters.opened)
    }

    pub fn closed(&self) -> usize {
        Counters::get(&self.counters.closed)
    }

    pub fn status_queries(&self) -> usize {
        Counters::get(&self.counters.status_queries)
    }

    pub fn leaked(&self) -> usize {
        Counters::get(&self.counters.leaked)
    }

    pub fn max_in_flight(&self) -> usize {
        Counters::get(&self.counters.max_in_flight)
    }
}

#[async_trait]
impl ReplicaConnector for ScriptedConnector {
    async fn connect(&self, server: &ServerDescriptor) -> Result<Box<dyn ReplicaSession>> {
        self.counters.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .get(&server.host)
            .cloned()
            .unwrap_or(Behavior::Refuse);

        match behavior {
            Behavior::Refuse => Err(ReplCheckError::connection_failed(
                server.endpoint(),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            behavior => {
                self.counters.opened.fetch_add(1, Ordering::SeqCst);
                let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
                Ok(Box::new(ScriptedSession {
                    host: server.host.clone(),
                    behavior,
                    counters: Arc::clone(&self.counters),
                    query_delay: self
                        .query_delays
                        .get(&server.host)
                        .copied()
                        .unwrap_or_default(),
                    query_order: Arc::clone(&self.query_order),
                    closed: false,
                }))
            }
        }
    }
}

struct ScriptedSession {
    host: String,
    behavior: Behavior,
    counters: Arc<Counters>,
    query_delay: Duration,
    query_order: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

#[async_trait]
impl ReplicaSession for ScriptedSession {
    async fn server_version(&mut self) -> Result<String> {
        Ok("8.0.36-scripted".to_string())
    }

    async fn fetch_status_rows(&mut self, _query: StatusQuery) -> Result<Vec<StatusRow>> {
        self.counters.status_queries.fetch_add(1, Ordering::SeqCst);
        self.query_order.lock().unwrap().push(self.host.clone());
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }

        match &self.behavior {
            Behavior::Rows(rows) => Ok(rows.clone()),
            Behavior::QueryError(message) => Err(ReplCheckError::query_failed(
                format!("{}:3306", self.host),
                std::io::Error::other(message.clone()),
            )),
            Behavior::QueryHang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            Behavior::Panic => panic!("scripted driver fault on {}", self.host),
            Behavior::Refuse | Behavior::Hang => unreachable!("never connected"),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        if !self.closed {
            self.counters.leaked.fetch_add(1, Ordering::SeqCst);
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// A full-width status row with the mapped columns set.
pub fn status_row(
    io_running: &str,
    sql_running: &str,
    read_pos: &str,
    relay_file: &str,
    relay_pos: &str,
    io_state: &str,
    last_error: &str,
) -> StatusRow {
    let mut row = StatusRow::new(vec![None; 58]);
    row.set(StatusColumn::IoRunning, io_running)
        .set(StatusColumn::SqlRunning, sql_running)
        .set(StatusColumn::ReadSourceLogPos, read_pos)
        .set(StatusColumn::RelayLogFile, relay_file)
        .set(StatusColumn::RelayLogPos, relay_pos)
        .set(StatusColumn::IoState, io_state)
        .set(StatusColumn::LastError, last_error);
    row
}

/// A healthy replica row.
pub fn healthy_row() -> StatusRow {
    status_row(
        "Yes",
        "Yes",
        "12345",
        "relay-bin.000007",
        "678",
        "Waiting for source to send event",
        "",
    )
}

/// A descriptor for `host` with throwaway credentials.
pub fn server(host: &str) -> ServerDescriptor {
    ServerDescriptor::new(host, "repl", "secret", "")
}

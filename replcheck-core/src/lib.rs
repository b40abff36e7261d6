//! Core replication status checking for replcheck.
//!
//! This crate connects to the servers of a MySQL main/node topology, reads
//! each one's replica status and reports one outcome per server. It is
//! shared by the `replcheck` binary and anything else that wants the same
//! checks without the command-line surface.
//!
//! # Security Guarantees
//! - Passwords live in zeroizing containers and never appear in `Debug`
//!   output, logs, errors or reports
//! - Only read-only administrative statements are executed
//! - Servers are identified by `host:port` everywhere
//!
//! # Architecture
//! - [`probe::ConnectionProbe`] opens connections with a timeout and a
//!   caller-supplied retry policy
//! - [`collector::ReplicationStatusCollector`] runs a pass over a server list,
//!   sequentially or with bounded concurrency, always in input order
//! - [`adapters`] hides the driver behind a connector trait; the `mysql`
//!   feature provides the sqlx implementation

pub mod adapters;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod probe;
pub mod security;
pub mod status;

// Re-export commonly used types
pub use adapters::{ReplicaConnector, ReplicaSession};
pub use collector::{PassEvent, PassHandle, ReplicationStatusCollector};
pub use config::{CheckConfig, CollectMode, ReplicationTopology, StatusQuery};
pub use error::{ReplCheckError, Result};
pub use models::{
    PassReport, PassSummary, ReplicationStatusRecord, ServerDescriptor, ServerOutcome,
    ThreadState, TopologyLabel,
};
pub use probe::{ConnectionProbe, ProbeResult, RetryContext, RetryPolicy};
pub use security::parse_server_url;

#[cfg(feature = "mysql")]
pub use adapters::mysql::MySqlConnector;

// Re-exported so callers can cancel passes without naming tokio-util.
pub use tokio_util::sync::CancellationToken;

//! Configuration types for replication checks.
//!
//! - `CheckConfig`: timeouts, retry policy, scheduling and status statement
//! - `ReplicationTopology`: the main server and its nodes, from CLI URLs or
//!   a JSON topology file
//!
//! # Security
//! Topology files may carry passwords; they are moved into zeroizing
//! containers on load and never written back out.

mod check;
mod topology;

pub use check::{
    CheckConfig, CollectMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUERY_TIMEOUT, DEFAULT_RETRY_DELAY,
    StatusQuery,
};
pub use topology::ReplicationTopology;

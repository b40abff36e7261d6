//! Replication status collection over a list of servers.
//!
//! One pass checks every server it is given and yields exactly one
//! [`ServerOutcome`] per server, in input order. A failing server never stops
//! the pass: connection failures, query failures and even driver panics are
//! contained to the server that caused them.
//!
//! Each server is checked on a single connection: connect (with the retry
//! policy and connect timeout), optionally read `VERSION()`, run the status
//! statement, close. The connection is closed before the outcome is produced
//! on every path.

use crate::adapters::{ReplicaConnector, ReplicaSession, close_session};
use crate::config::CheckConfig;
use crate::error::ReplCheckError;
use crate::models::{
    PassReport, PassSummary, ServerDescriptor, ServerOutcome, TopologyLabel,
};
use crate::probe::ConnectionProbe;
use crate::status::parse_status_row;
use crate::Result;
use chrono::Utc;
use futures::FutureExt;
use futures::stream::{self, Stream, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reason reported for servers skipped by a cancelled pass.
pub const CANCELLED_REASON: &str = "collection pass cancelled";

/// Collects replication status from MySQL servers.
///
/// Cloning is cheap; clones share the connector.
///
/// # Example
/// ```rust,no_run
/// use replcheck_core::{CheckConfig, ReplicationStatusCollector, ServerDescriptor, TopologyLabel};
///
/// # async fn example() {
/// let collector = ReplicationStatusCollector::mysql(CheckConfig::default());
/// let servers = vec![
///     ServerDescriptor::new("db1", "repl", "secret", ""),
///     ServerDescriptor::new("db2", "repl", "secret", ""),
/// ];
///
/// for outcome in collector.collect(&servers, TopologyLabel::MainToNode).await {
///     println!("{}: failed={}", outcome.host(), outcome.is_failure());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReplicationStatusCollector {
    probe: ConnectionProbe,
    config: CheckConfig,
}

impl ReplicationStatusCollector {
    /// Creates a collector that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn ReplicaConnector>, config: CheckConfig) -> Self {
        Self {
            probe: ConnectionProbe::new(connector, &config),
            config,
        }
    }

    /// Creates a collector backed by the sqlx MySQL connector.
    #[cfg(feature = "mysql")]
    pub fn mysql(config: CheckConfig) -> Self {
        Self::new(
            Arc::new(crate::adapters::mysql::MySqlConnector::new()),
            config,
        )
    }

    /// Settings used by this collector.
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// The reachability probe sharing this collector's connector and retry
    /// policy.
    pub fn probe(&self) -> &ConnectionProbe {
        &self.probe
    }

    /// Checks every server and returns one outcome per server, in input order.
    ///
    /// Never fails. `topology` only labels the pass in logs; it does not
    /// change how status rows are read.
    pub async fn collect(
        &self,
        servers: &[ServerDescriptor],
        topology: TopologyLabel,
    ) -> Vec<ServerOutcome> {
        self.collect_with_cancel(servers, topology, &CancellationToken::new())
            .await
    }

    /// Like [`collect`](Self::collect), stopping early when `cancel` fires.
    ///
    /// Servers already being checked finish normally; servers not yet
    /// started are reported `Unreachable` with [`CANCELLED_REASON`].
    pub async fn collect_with_cancel(
        &self,
        servers: &[ServerDescriptor],
        topology: TopologyLabel,
        cancel: &CancellationToken,
    ) -> Vec<ServerOutcome> {
        info!(
            "Collecting {} replication status from {} server(s)",
            topology,
            servers.len()
        );
        self.outcome_stream(servers.to_vec(), cancel.clone())
            .collect()
            .await
    }

    /// Runs a pass on its own task and streams its events.
    ///
    /// The handle yields one [`PassEvent::Outcome`] per server in input
    /// order, then exactly one [`PassEvent::Finished`].
    pub fn spawn_pass(
        &self,
        servers: Vec<ServerDescriptor>,
        topology: TopologyLabel,
        cancel: CancellationToken,
    ) -> PassHandle {
        let (events, receiver) = mpsc::unbounded_channel();
        let total = servers.len();
        let stream = self.outcome_stream(servers, cancel.clone());
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let started_at = Utc::now();
            let mut completion = PassCompletion::new(events, PassSummary::new(topology, total));
            info!(
                "Collecting {} replication status from {} server(s)",
                topology, total
            );

            let mut stream = std::pin::pin!(stream);
            let mut outcomes = Vec::with_capacity(total);
            while let Some(outcome) = stream.next().await {
                completion.outcome(outcome.clone());
                outcomes.push(outcome);
            }

            let summary = completion.finish(task_cancel.is_cancelled());
            PassReport {
                topology,
                started_at,
                finished_at: Utc::now(),
                outcomes,
                summary,
            }
        });

        PassHandle {
            events: receiver,
            cancel,
            task,
        }
    }

    /// Order-preserving stream of outcomes, checking up to `max_in_flight`
    /// servers at once.
    fn outcome_stream(
        &self,
        servers: Vec<ServerDescriptor>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ServerOutcome> + Send + 'static {
        let width = self.config.mode.max_in_flight();
        let collector = self.clone();

        stream::iter(servers)
            .map(move |server| {
                let collector = collector.clone();
                let cancel = cancel.clone();
                async move { collector.check_server_guarded(&server, &cancel).await }
            })
            .buffered(width)
    }

    /// Checks one server, turning a cancelled pass or a panic into an outcome.
    async fn check_server_guarded(
        &self,
        server: &ServerDescriptor,
        cancel: &CancellationToken,
    ) -> ServerOutcome {
        if cancel.is_cancelled() {
            debug!("Skipping {}: {}", server.endpoint(), CANCELLED_REASON);
            return ServerOutcome::Unreachable {
                host: server.host.clone(),
                reason: CANCELLED_REASON.to_string(),
            };
        }

        match AssertUnwindSafe(self.check_server(server))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let error = ReplCheckError::unexpected(format!(
                    "panic while checking {}: {}",
                    server.endpoint(),
                    panic_message(payload.as_ref())
                ));
                warn!("{}", error);
                ServerOutcome::QueryFailed {
                    host: server.host.clone(),
                    reason: error.to_string(),
                }
            }
        }
    }

    /// The session is closed on every path once opened, including a panic in
    /// the queries.
    async fn check_server(&self, server: &ServerDescriptor) -> ServerOutcome {
        let endpoint = server.endpoint();
        info!("Checking replication status for {}", endpoint);

        let mut session = match self.probe.open(server).await {
            Ok(session) => session,
            Err(e) => {
                warn!("{} is unreachable: {}", endpoint, e);
                return ServerOutcome::Unreachable {
                    host: server.host.clone(),
                    reason: e.to_string(),
                };
            }
        };

        let result = match AssertUnwindSafe(self.query_status(session.as_mut(), server))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(ReplCheckError::unexpected(format!(
                "panic while checking {}: {}",
                endpoint,
                panic_message(payload.as_ref())
            ))),
        };
        close_session(session, &endpoint).await;

        result.unwrap_or_else(|e| {
            warn!("Reading replication status from {} failed: {}", endpoint, e);
            ServerOutcome::QueryFailed {
                host: server.host.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Runs the version and status queries on an open session.
    ///
    /// Zero status rows yield `NoReplicationConfigured`.
    async fn query_status(
        &self,
        session: &mut dyn ReplicaSession,
        server: &ServerDescriptor,
    ) -> Result<ServerOutcome> {
        let endpoint = server.endpoint();
        let query_timeout = self.config.query_timeout;

        let server_version = if self.config.fetch_server_version {
            match tokio::time::timeout(query_timeout, session.server_version()).await {
                Ok(Ok(version)) => {
                    debug!("{} runs MySQL {}", endpoint, version);
                    Some(version)
                }
                Ok(Err(e)) => {
                    debug!("Could not read server version of {}: {}", endpoint, e);
                    None
                }
                Err(_) => {
                    debug!("Server version query on {} timed out", endpoint);
                    None
                }
            }
        } else {
            None
        };

        let rows = tokio::time::timeout(
            query_timeout,
            session.fetch_status_rows(self.config.status_query),
        )
        .await
        .map_err(|_| ReplCheckError::query_timeout(endpoint.clone(), query_timeout))??;

        match rows.first() {
            None => {
                info!("No replication status found for {}", endpoint);
                Ok(ServerOutcome::NoReplicationConfigured {
                    host: server.host.clone(),
                    server_version,
                })
            }
            Some(row) => {
                if rows.len() > 1 {
                    debug!(
                        "{} reports {} replication channels; using the first",
                        endpoint,
                        rows.len()
                    );
                }
                parse_status_row(&server.host, row, server_version).map(ServerOutcome::Status)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Event emitted by a spawned pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEvent {
    /// One server's outcome, in input order
    Outcome(ServerOutcome),
    /// The pass ended; always the last event
    Finished(PassSummary),
}

/// Sends `Finished` exactly once, including when the pass task unwinds.
struct PassCompletion {
    events: mpsc::UnboundedSender<PassEvent>,
    summary: PassSummary,
    finished: bool,
}

impl PassCompletion {
    fn new(events: mpsc::UnboundedSender<PassEvent>, summary: PassSummary) -> Self {
        Self {
            events,
            summary,
            finished: false,
        }
    }

    fn outcome(&mut self, outcome: ServerOutcome) {
        self.summary.record(&outcome);
        // A dropped receiver only means nobody is watching.
        let _ = self.events.send(PassEvent::Outcome(outcome));
    }

    fn finish(mut self, cancelled: bool) -> PassSummary {
        self.summary.cancelled = cancelled;
        self.finished = true;
        let _ = self.events.send(PassEvent::Finished(self.summary.clone()));
        self.summary.clone()
    }
}

impl Drop for PassCompletion {
    fn drop(&mut self) {
        if !self.finished {
            self.summary.interrupted = true;
            let _ = self.events.send(PassEvent::Finished(self.summary.clone()));
        }
    }
}

/// Handle to a pass started with [`ReplicationStatusCollector::spawn_pass`].
#[derive(Debug)]
pub struct PassHandle {
    events: mpsc::UnboundedReceiver<PassEvent>,
    cancel: CancellationToken,
    task: JoinHandle<PassReport>,
}

impl PassHandle {
    /// Next event, or `None` once `Finished` has been received and the
    /// task has ended.
    pub async fn next_event(&mut self) -> Option<PassEvent> {
        self.events.recv().await
    }

    /// Requests cancellation; servers not yet started are skipped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this pass.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the pass to end and returns its report.
    ///
    /// # Errors
    /// Returns `Unexpected` if the pass task panicked or was aborted.
    pub async fn wait(self) -> Result<PassReport> {
        self.task.await.map_err(|e| {
            ReplCheckError::unexpected(format!("collection pass task failed: {}", e))
        })
    }
}

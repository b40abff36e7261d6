//! Rendering of outcomes and reports, and report file output.

use chrono::{DateTime, Utc};
use replcheck_core::{
    PassReport, PassSummary, ProbeResult, ReplCheckError, Result, ServerOutcome, TopologyLabel,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Separator printed after each replica's status block.
pub const SEPARATOR_WIDTH: usize = 50;

/// Every pass of one `check` run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub generated_at: DateTime<Utc>,
    pub passes: Vec<PassReport>,
}

impl CheckReport {
    /// Wraps finished passes.
    pub fn new(passes: Vec<PassReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            passes,
        }
    }

    /// True when any pass had an unreachable or failed server, or stopped early.
    pub fn has_failures(&self) -> bool {
        self.passes.iter().any(|pass| pass.summary.has_failures())
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error (not expected for these types).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ReplCheckError::Serialization {
            context: "Failed to serialize check report".to_string(),
            source: e,
        })
    }
}

/// Result of probing one server.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeEntry {
    pub server: String,
    #[serde(flatten)]
    pub result: ProbeResult,
}

/// Title line for a pass.
pub fn render_pass_header(topology: TopologyLabel) -> String {
    format!("=== Replication status: {} ===\n", topology)
}

/// Text block for one server.
pub fn render_outcome(outcome: &ServerOutcome) -> String {
    let mut text = format!("\nChecking replication status for {}...\n", outcome.host());

    // Writing into a String cannot fail.
    if let Some(version) = outcome.server_version() {
        let _ = writeln!(text, "Connected to MySQL Server {}", version);
    }
    let _ = match outcome {
        ServerOutcome::Unreachable { host, reason } => {
            writeln!(text, "Failed to connect to {}: {}", host, reason)
        }
        ServerOutcome::QueryFailed { reason, .. } => writeln!(text, "MySQL error: {}", reason),
        ServerOutcome::NoReplicationConfigured { host, .. } => {
            writeln!(text, "No replication slave status found for {}.", host)
        }
        ServerOutcome::Status(record) => {
            writeln!(
                text,
                "Slave IO Running: {}\n\
                 Slave SQL Running: {}\n\
                 Read Master Log Pos: {}\n\
                 Relay Log File: {}\n\
                 Relay Log Pos: {}\n\
                 Slave IO State: {}\n\
                 Last Error: {}\n\
                 {}",
                record.io_thread_running,
                record.sql_thread_running,
                record.read_source_log_position,
                record.relay_log_file,
                record.relay_log_position,
                record.io_thread_state,
                record.last_error,
                "-".repeat(SEPARATOR_WIDTH)
            )
        }
    };

    text
}

/// One-line tally for a finished pass.
pub fn render_summary(summary: &PassSummary) -> String {
    let mut line = format!(
        "\n{}: {} server(s), {} replicating, {} not configured, {} unreachable, {} failed",
        summary.topology,
        summary.total,
        summary.status,
        summary.not_configured,
        summary.unreachable,
        summary.query_failed
    );
    if summary.cancelled {
        line.push_str(" (cancelled)");
    }
    if summary.interrupted {
        line.push_str(" (interrupted)");
    }
    line.push('\n');
    line
}

/// Text line for one probe.
pub fn render_probe(entry: &ProbeEntry) -> String {
    match &entry.result {
        ProbeResult::Reachable => format!("{}: reachable", entry.server),
        ProbeResult::Unreachable(reason) => format!("{}: unreachable ({})", entry.server, reason),
    }
}

/// Saves a report as pretty-printed JSON.
///
/// # Errors
/// Returns error if serialization or the write fails.
pub async fn save_json(report: &CheckReport, output_path: &Path) -> Result<()> {
    let json_data = report.to_json()?;
    tokio::fs::write(output_path, json_data)
        .await
        .map_err(|e| ReplCheckError::Io {
            context: format!("Failed to write to {}", output_path.display()),
            source: e,
        })?;
    Ok(())
}

//! MySQL replication status checker.
//!
//! This binary connects to a main server and its nodes and reports the
//! replica status of each one. It operates with security-first principles.
//!
//! # Security Guarantees
//! - Read-only statements only
//! - No credentials stored or logged
//! - Reports identify servers by host and port only
//!
//! # Exit Status
//! - `0`: every server was reachable and answered
//! - `1`: invalid arguments or configuration
//! - `2`: at least one server was unreachable or failed

use clap::Parser;
use replcheck::output::{self, CheckReport, ProbeEntry};
use replcheck::servers::{self, parse_urls, prompt_missing_password};
use replcheck::{CheckArgs, Cli, Command, OutputFormat, ProbeArgs};
use replcheck_core::logging::init_logging;
use replcheck_core::{
    CancellationToken, ConnectionProbe, PassEvent, ReplCheckError, ReplicationStatusCollector,
    Result,
};
use tracing::{error, info, warn};

/// Exit status when any server is unreachable or failed.
const EXIT_UNHEALTHY: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    let healthy = match &cli.command {
        Command::Check(args) => run_check(args).await,
        Command::Probe(args) => run_probe(args).await,
    }
    .map_err(|e| {
        error!("{}", e);
        e
    })?;

    if !healthy {
        std::process::exit(EXIT_UNHEALTHY);
    }
    Ok(())
}

/// Runs the main -> node and node -> node passes.
///
/// Returns whether every server answered.
async fn run_check(args: &CheckArgs) -> Result<bool> {
    let config = args.to_config()?;
    let topology = servers::resolve_topology(args).await?;
    let collector = ReplicationStatusCollector::mysql(config);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let text = args.format == OutputFormat::Text;
    let mut passes = Vec::new();
    for (topology_label, servers) in topology.passes() {
        if cancel.is_cancelled() {
            warn!("Skipping {} pass after interrupt", topology_label);
            break;
        }

        if text {
            print!("\n{}", output::render_pass_header(topology_label));
        }

        let mut handle = collector.spawn_pass(servers, topology_label, cancel.clone());
        while let Some(event) = handle.next_event().await {
            match event {
                PassEvent::Outcome(outcome) if text => {
                    print!("{}", output::render_outcome(&outcome));
                }
                PassEvent::Outcome(_) => {}
                PassEvent::Finished(summary) => {
                    info!(
                        "{} pass finished: {} of {} server(s) reported",
                        summary.topology,
                        summary.reported(),
                        summary.total
                    );
                    if text {
                        print!("{}", output::render_summary(&summary));
                    }
                }
            }
        }
        passes.push(handle.wait().await?);
    }

    let report = CheckReport::new(passes);
    if args.format == OutputFormat::Json {
        println!("{}", report.to_json()?);
    }
    if let Some(path) = &args.output {
        output::save_json(&report, path).await?;
        info!("✓ Report saved to {}", path.display());
    }

    Ok(!report.has_failures())
}

/// Probes each URL in order.
///
/// Returns whether every server was reachable.
async fn run_probe(args: &ProbeArgs) -> Result<bool> {
    let config = args.to_config()?;
    let mut targets = parse_urls(&args.urls)?;
    if args.connection.ask_password {
        targets = targets
            .into_iter()
            .map(prompt_missing_password)
            .collect::<Result<Vec<_>>>()?;
    }

    let probe = ConnectionProbe::mysql(&config);
    let mut entries = Vec::with_capacity(targets.len());
    for target in &targets {
        info!("Probing {}...", target.endpoint());
        let entry = ProbeEntry {
            server: target.endpoint(),
            result: probe.probe(target).await,
        };
        if args.format == OutputFormat::Text {
            println!("{}", output::render_probe(&entry));
        }
        entries.push(entry);
    }

    if args.format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&entries).map_err(|e| {
            ReplCheckError::Serialization {
                context: "Failed to serialize probe results".to_string(),
                source: e,
            }
        })?;
        println!("{}", json);
    }

    Ok(entries.iter().all(|entry| entry.result.is_reachable()))
}

/// Cancels `cancel` on Ctrl-C. Servers already being checked finish; the
/// rest are reported as skipped.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, skipping servers not yet checked");
            cancel.cancel();
        }
    });
}

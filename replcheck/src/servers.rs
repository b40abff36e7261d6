//! Resolves the servers to check from CLI flags, the environment, or a
//! topology file.
//!
//! # Security
//! URLs are only ever logged redacted. Missing passwords are read from the
//! terminal without echo and go straight into zeroizing storage.

use crate::CheckArgs;
use replcheck_core::error::redact_server_url;
use replcheck_core::{
    ReplCheckError, ReplicationTopology, Result, ServerDescriptor, parse_server_url,
};
use tracing::{debug, info};

/// Builds the topology described by `args`.
///
/// A topology file takes precedence over `--main`, which may come from the
/// environment; combining a file with `--node` is an error.
///
/// # Errors
/// Returns error if no main server is given, a URL or file is invalid, or a
/// password prompt fails.
pub async fn resolve_topology(args: &CheckArgs) -> Result<ReplicationTopology> {
    let topology = match (&args.servers_file, &args.main) {
        (Some(path), main) => {
            if !args.nodes.is_empty() {
                return Err(ReplCheckError::configuration(
                    "--node cannot be combined with --servers-file",
                ));
            }
            if main.is_some() {
                debug!("Ignoring --main in favor of {}", path.display());
            }
            info!("Loading topology from {}", path.display());
            ReplicationTopology::load(path).await?
        }
        (None, Some(main)) => {
            debug!("Main server: {}", redact_server_url(main));
            ReplicationTopology::new(parse_server_url(main)?, parse_urls(&args.nodes)?)
        }
        (None, None) => {
            return Err(ReplCheckError::configuration(format!(
                "a main server is required: use --main, {} or --servers-file",
                crate::MAIN_URL_ENV
            )));
        }
    };

    let topology = if args.connection.ask_password {
        topology.map_servers(prompt_missing_password)?
    } else {
        topology
    };

    topology.validate()?;
    info!(
        "Topology: main {} with {} node(s)",
        topology.main,
        topology.nodes.len()
    );
    Ok(topology)
}

/// Parses every URL, failing on the first invalid one.
///
/// # Errors
/// Returns the parse error of the first invalid URL (already redacted).
pub fn parse_urls(urls: &[String]) -> Result<Vec<ServerDescriptor>> {
    urls.iter().map(|url| parse_server_url(url)).collect()
}

/// Asks for the password of a descriptor that has none.
///
/// # Errors
/// Returns an I/O error if the terminal cannot be read.
pub fn prompt_missing_password(server: ServerDescriptor) -> Result<ServerDescriptor> {
    if server.has_password() {
        return Ok(server);
    }

    let password = rpassword::prompt_password(format!(
        "Password for {}@{}: ",
        server.user(),
        server.endpoint()
    ))
    .map_err(|e| ReplCheckError::Io {
        context: format!("Failed to read password for {}", server.endpoint()),
        source: e,
    })?;

    Ok(server.with_password(password))
}

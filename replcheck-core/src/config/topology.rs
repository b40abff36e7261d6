//! Replication topology: one main server and its node servers.

use crate::error::ReplCheckError;
use crate::models::{DEFAULT_MYSQL_PORT, ServerDescriptor, TopologyLabel};
use serde::Deserialize;
use std::path::Path;

/// The servers to check, as the caller arranged them.
///
/// # Example
/// ```rust
/// use replcheck_core::{ReplicationTopology, ServerDescriptor, TopologyLabel};
///
/// let topology = ReplicationTopology::new(
///     ServerDescriptor::new("main", "repl", "secret", "app"),
///     vec![
///         ServerDescriptor::new("node1", "repl", "secret", "app"),
///         ServerDescriptor::new("node2", "repl", "secret", "app"),
///     ],
/// );
///
/// let passes = topology.passes();
/// assert_eq!(passes[0].0, TopologyLabel::MainToNode);
/// assert_eq!(passes[0].1.len(), 3);
/// assert_eq!(passes[1].0, TopologyLabel::NodeToNode);
/// assert_eq!(passes[1].1.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTopology {
    pub main: ServerDescriptor,
    pub nodes: Vec<ServerDescriptor>,
}

/// One server entry in a topology file.
///
/// Deliberately not `Debug` or `Serialize`: it may hold a plaintext password.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerEntry {
    host: String,
    user: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    database: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

impl From<ServerEntry> for ServerDescriptor {
    fn from(entry: ServerEntry) -> Self {
        ServerDescriptor::new(
            entry.host,
            entry.user,
            entry.password.unwrap_or_default(),
            entry.database,
        )
        .with_port(entry.port)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TopologyFile {
    main: ServerEntry,
    #[serde(default)]
    nodes: Vec<ServerEntry>,
}

impl ReplicationTopology {
    /// Creates a topology from already-built descriptors.
    pub fn new(main: ServerDescriptor, nodes: Vec<ServerDescriptor>) -> Self {
        Self { main, nodes }
    }

    /// Parses a JSON topology document.
    ///
    /// ```json
    /// {
    ///   "main":  { "host": "db-main", "user": "repl", "password": "...", "database": "app" },
    ///   "nodes": [ { "host": "db-node1", "user": "repl", "port": 3307 } ]
    /// }
    /// ```
    ///
    /// # Errors
    /// Returns error for malformed JSON, unknown fields, or invalid servers.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let file: TopologyFile =
            serde_json::from_str(json).map_err(|e| ReplCheckError::Serialization {
                context: "Failed to parse topology file".to_string(),
                source: e,
            })?;

        let topology = Self::new(
            file.main.into(),
            file.nodes.into_iter().map(Into::into).collect(),
        );
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a JSON topology file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or fails to parse.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReplCheckError::Io {
                context: format!("Failed to read topology file {}", path.display()),
                source: e,
            })?;
        Self::from_json_str(&json)
    }

    /// Validates every descriptor.
    ///
    /// # Errors
    /// Returns the first descriptor validation error.
    pub fn validate(&self) -> crate::Result<()> {
        self.main.validate()?;
        self.nodes.iter().try_for_each(ServerDescriptor::validate)
    }

    /// Every descriptor, main first.
    pub fn servers(&self) -> impl Iterator<Item = &ServerDescriptor> {
        std::iter::once(&self.main).chain(self.nodes.iter())
    }

    /// Applies `f` to every descriptor, main first.
    pub fn map_servers<F>(self, mut f: F) -> crate::Result<Self>
    where
        F: FnMut(ServerDescriptor) -> crate::Result<ServerDescriptor>,
    {
        let main = f(self.main)?;
        let nodes = self
            .nodes
            .into_iter()
            .map(f)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { main, nodes })
    }

    /// The collection passes to run, in order.
    ///
    /// `MainToNode` covers the main server and every node; `NodeToNode`
    /// covers the nodes alone and is omitted when there are none.
    pub fn passes(&self) -> Vec<(TopologyLabel, Vec<ServerDescriptor>)> {
        let mut passes = vec![(TopologyLabel::MainToNode, self.servers().cloned().collect())];
        if !self.nodes.is_empty() {
            passes.push((TopologyLabel::NodeToNode, self.nodes.clone()));
        }
        passes
    }
}

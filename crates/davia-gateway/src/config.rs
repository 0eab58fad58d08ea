//! Dev server configuration
//!
//! Layered lowest to highest: built-in defaults, `davia.toml`, environment,
//! then command-line flags (applied by the binary).

use davia_core::{Error, Locator, Result};
use davia_graph::{RetryPolicy, DEFAULT_ENGINE_URL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "davia.toml";

pub const ENV_GRAPH: &str = "DAVIA_GRAPH";
pub const ENV_STATE_DB: &str = "DAVIA_STATE_DB";
pub const ENV_GRAPHS: &str = "LANGSERVE_GRAPHS";
pub const ENV_ENGINE_URL: &str = "DAVIA_ENGINE_URL";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DevConfig {
    pub host: String,
    pub port: u16,
    /// Locator of the graph `/chat` runs.
    pub graph: Option<String>,
    /// Declaratively configured graphs, name → locator.
    pub graphs: BTreeMap<String, String>,
    /// Extra manifests whose tasks and graphs are registered at startup.
    pub modules: Vec<String>,
    pub state_db: Option<PathBuf>,
    pub engine_url: String,
    pub assistants: AssistantsConfig,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 2025,
            graph: None,
            graphs: BTreeMap::new(),
            modules: Vec::new(),
            state_db: None,
            engine_url: DEFAULT_ENGINE_URL.into(),
            assistants: AssistantsConfig::default(),
        }
    }
}

/// Timeout and retry for the assistants endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantsConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for AssistantsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 10_000,
            attempts: 3,
            backoff_ms: 200,
        }
    }
}

impl AssistantsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            attempts: self.attempts,
            base_delay: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// The graph `/chat` and the state map endpoints act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveGraph {
    pub name: String,
    pub locator: String,
}

impl DevConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigInvalid(e.to_string()))
    }

    /// Load `path`, or `davia.toml` in `dir` when no path is given.
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (dir.join(CONFIG_FILE), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text)
                .map_err(|e| Error::ConfigInvalid(format!("{}: {}", path.display(), e))),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::ConfigInvalid(format!("{}: {}", path.display(), e))),
        }
    }

    /// Overlay the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(graph) = non_empty(ENV_GRAPH) {
            self.graph = Some(graph);
        }
        if let Some(db) = non_empty(ENV_STATE_DB) {
            self.state_db = Some(PathBuf::from(db));
        }
        if let Some(url) = non_empty(ENV_ENGINE_URL) {
            self.engine_url = url;
        }
        if let Some(raw) = non_empty(ENV_GRAPHS) {
            let graphs: BTreeMap<String, String> = serde_json::from_str(&raw)
                .map_err(|e| Error::ConfigInvalid(format!("{} is not a JSON object: {}", ENV_GRAPHS, e)))?;
            self.graphs.extend(graphs);
        }
        Ok(self)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn require_state_db(&self) -> Result<&Path> {
        self.state_db
            .as_deref()
            .ok_or_else(|| Error::config_missing(ENV_STATE_DB))
    }

    /// The active graph. Its name is the key it is configured under in
    /// `graphs`, falling back to the locator's identifier.
    pub fn active_graph(&self) -> Result<ActiveGraph> {
        let locator = self
            .graph
            .as_deref()
            .ok_or_else(|| Error::config_missing(ENV_GRAPH))?;
        let name = match self.graphs.iter().find(|(_, l)| l.as_str() == locator) {
            Some((name, _)) => name.clone(),
            None => Locator::parse(locator)?.identifier().to_string(),
        };
        Ok(ActiveGraph {
            name,
            locator: locator.to_string(),
        })
    }

    /// Every graph `/graph-schemas` describes: the configured map plus the
    /// active graph when it is not already listed.
    pub fn configured_graphs(&self) -> Result<Vec<ActiveGraph>> {
        let mut graphs: Vec<ActiveGraph> = self
            .graphs
            .iter()
            .map(|(name, locator)| ActiveGraph {
                name: name.clone(),
                locator: locator.clone(),
            })
            .collect();
        if self.graph.is_some() {
            let active = self.active_graph()?;
            if !graphs.iter().any(|g| g.name == active.name) {
                graphs.push(active);
            }
        }
        Ok(graphs)
    }
}

//! Module manifests: the static description of what a user unit exports.
//!
//! ```toml
//! doc = "Weather agent"
//!
//! [types.AgentState]
//! shape = "typed_dict"
//! bases = ["MessagesState"]
//! fields = [{ name = "city", type = "Optional[str]" }]
//!
//! [graphs.workflow]
//! doc = "Calls the model, then tools, until done."
//! state = "AgentState"
//!
//! [tasks.get_weather]
//! doc = "Call to get the current weather."
//! parameters = [{ name = "location", type = "str" }]
//! returns = "str"
//!
//! [aliases.agent]
//! wraps = "workflow"
//! ```
//!
//! The same structure is accepted as JSON or YAML.

use crate::handle::{GraphDef, TaskDef};
use davia_core::typeschema::{TypeCatalog, TypeDecl};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest file extensions, in probe order.
pub const MANIFEST_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleFormat {
    Toml,
    Json,
    Yaml,
}

impl ModuleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A decorated export: resolves to another export one layer down.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasDef {
    pub wraps: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    pub graphs: BTreeMap<String, GraphDef>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDef>,
    #[serde(default)]
    pub aliases: BTreeMap<String, AliasDef>,
}

impl ModuleManifest {
    pub fn parse(text: &str, format: ModuleFormat) -> Result<Self, String> {
        match format {
            ModuleFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            ModuleFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            ModuleFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, String> {
        let format = ModuleFormat::from_path(path)
            .ok_or_else(|| format!("{} is not a .toml, .json or .yaml manifest", path.display()))?;
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {}", path.display(), e))?;
        Self::parse(&text, format).map_err(|e| format!("could not parse {}: {}", path.display(), e))
    }

    /// Type declarations with their map keys as names, layered over the prelude.
    pub fn catalog(&self) -> TypeCatalog {
        let mut catalog = TypeCatalog::with_prelude();
        catalog.extend(self.types.iter().map(|(name, decl)| {
            let mut decl = decl.clone();
            decl.name = name.clone();
            decl
        }));
        catalog
    }
}

/// A manifest as loaded from disk.
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    /// Path shown to clients, relative to the working directory when possible.
    pub source_file: String,
    pub manifest: ModuleManifest,
    pub catalog: Arc<TypeCatalog>,
}

/// What an identifier names inside a module.
#[derive(Debug, PartialEq)]
pub enum Export<'a> {
    Graph(&'a GraphDef),
    Task(&'a TaskDef),
    Alias(&'a AliasDef),
    Type(&'a TypeDecl),
}

impl LoadedModule {
    pub fn new(path: PathBuf, source_file: String, manifest: ModuleManifest) -> Self {
        let catalog = Arc::new(manifest.catalog());
        Self {
            path,
            source_file,
            manifest,
            catalog,
        }
    }

    pub fn export(&self, name: &str) -> Option<Export<'_>> {
        let m = &self.manifest;
        m.graphs
            .get(name)
            .map(Export::Graph)
            .or_else(|| m.tasks.get(name).map(Export::Task))
            .or_else(|| m.aliases.get(name).map(Export::Alias))
            .or_else(|| m.types.get(name).map(Export::Type))
    }

    pub fn graph_names(&self) -> impl Iterator<Item = &str> {
        self.manifest.graphs.keys().map(String::as_str)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.manifest.tasks.keys().map(String::as_str)
    }
}

//! Dynamic loader: locator → live handle.
//!
//! The module half of a locator is either a manifest file (`graphs/chat.toml`,
//! `/abs/agent.yaml`) or a dotted module path (`app.graphs.chat`) that is
//! probed as `app/graphs/chat.{toml,json,yaml,yml}` in every search path.
//! The working directory is always the first search path.

use crate::handle::{Handle, Target};
use crate::module::{Export, LoadedModule, ModuleFormat, ModuleManifest, MANIFEST_EXTENSIONS};
use dashmap::DashMap;
use davia_core::{EntryKind, Error, Locator, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

pub struct DynamicLoader {
    working_dir: PathBuf,
    search_paths: RwLock<Vec<PathBuf>>,
    modules: DashMap<PathBuf, Arc<LoadedModule>>,
}

impl DynamicLoader {
    /// Loader rooted at the process working directory.
    pub fn new() -> Result<Self> {
        Ok(Self::with_working_dir(std::env::current_dir()?))
    }

    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            search_paths: RwLock::new(Vec::new()),
            modules: DashMap::new(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Add a directory to the front of the search path. Returns false if it
    /// was already present.
    pub fn add_search_path(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut paths = self.search_paths.write().unwrap_or_else(|e| e.into_inner());
        if paths.contains(&path) {
            return false;
        }
        paths.insert(0, path);
        true
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Load a graph or task.
    pub fn load(&self, locator: &str) -> Result<Handle> {
        let loc = Locator::parse(locator)?;
        self.add_search_path(self.working_dir.clone());
        let module = self.import(loc.module(), &loc, false)?;
        resolve_export(&module, &loc)
    }

    /// Load and require a graph.
    pub fn load_graph(&self, locator: &str) -> Result<Handle> {
        self.load_kind(locator, EntryKind::Graph, false)
    }

    /// Load and require a task.
    pub fn load_task(&self, locator: &str) -> Result<Handle> {
        self.load_kind(locator, EntryKind::Task, false)
    }

    /// Re-read the manifest behind `locator` and require a graph.
    pub fn reload_graph(&self, locator: &str) -> Result<Handle> {
        self.load_kind(locator, EntryKind::Graph, true)
    }

    /// Load the module a locator points into, bypassing the cache.
    pub fn reload(&self, locator: &str) -> Result<Handle> {
        let loc = Locator::parse(locator)?;
        self.add_search_path(self.working_dir.clone());
        let module = self.import(loc.module(), &loc, true)?;
        resolve_export(&module, &loc)
    }

    /// Import a whole module, given as a manifest file or dotted module path.
    pub fn import_module(&self, module: &str) -> Result<Arc<LoadedModule>> {
        let module = module.trim();
        if module.is_empty() {
            return Err(Error::PathFormatInvalid(module.to_string()));
        }
        self.add_search_path(self.working_dir.clone());
        self.import(module, &module, false)
    }

    fn load_kind(&self, locator: &str, expected: EntryKind, fresh: bool) -> Result<Handle> {
        let handle = if fresh {
            self.reload(locator)?
        } else {
            self.load(locator)?
        };
        if handle.kind() != expected {
            return Err(Error::type_mismatch(
                locator,
                format!("{} is a {}, not a {}", handle.name, handle.kind(), expected),
            ));
        }
        Ok(handle)
    }

    fn import(
        &self,
        module_ref: &str,
        origin: &dyn std::fmt::Display,
        fresh: bool,
    ) -> Result<Arc<LoadedModule>> {
        let path = self
            .resolve_module(module_ref)
            .map_err(|cause| Error::module_not_found(origin, cause))?;

        if !fresh {
            if let Some(module) = self.modules.get(&path) {
                return Ok(module.clone());
            }
        }

        debug!("Importing module {}", path.display());
        let manifest =
            ModuleManifest::from_path(&path).map_err(|cause| Error::module_not_found(origin, cause))?;
        let module = Arc::new(LoadedModule::new(
            path.clone(),
            self.display_path(&path),
            manifest,
        ));
        self.modules.insert(path, module.clone());
        Ok(module)
    }

    fn resolve_module(&self, reference: &str) -> std::result::Result<PathBuf, String> {
        let as_path = Path::new(reference);
        let looks_like_file = ModuleFormat::from_path(as_path).is_some()
            || reference.contains('/')
            || reference.contains('\\');

        if looks_like_file {
            let candidate = if as_path.is_absolute() {
                as_path.to_path_buf()
            } else {
                self.working_dir.join(as_path)
            };
            if candidate.is_file() {
                return Ok(canonical(candidate));
            }
            return Err(format!("no such file: {}", candidate.display()));
        }

        if reference.split('.').any(|segment| segment.is_empty()) {
            return Err(format!("invalid module path: {}", reference));
        }
        let relative: PathBuf = reference.split('.').collect();
        for dir in self.search_paths() {
            for ext in MANIFEST_EXTENSIONS {
                let candidate = dir.join(&relative).with_extension(ext);
                if candidate.is_file() {
                    return Ok(canonical(candidate));
                }
            }
        }
        Err(format!("No module named '{}'", reference))
    }

    fn display_path(&self, path: &Path) -> String {
        let base = canonical(self.working_dir.clone());
        path.strip_prefix(&base)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Find the identifier and check it is a graph or task, unwrapping one
/// layer of aliasing.
fn resolve_export(module: &LoadedModule, loc: &Locator) -> Result<Handle> {
    let name = loc.identifier();
    let export = module.export(name).ok_or_else(|| {
        Error::attribute_missing(
            loc,
            format!("Module {} does not have a variable named {}", loc.module(), name),
        )
    })?;

    let target = match export {
        Export::Graph(graph) => Target::Graph(graph.clone()),
        Export::Task(task) => Target::Task(task.clone()),
        Export::Type(_) => {
            return Err(Error::type_mismatch(
                loc,
                format!("{} is a type declaration, not a graph or task", name),
            ))
        }
        Export::Alias(alias) => match module.export(&alias.wraps) {
            Some(Export::Graph(graph)) => Target::Graph(graph.clone()),
            Some(Export::Task(task)) => Target::Task(task.clone()),
            Some(Export::Alias(_)) => {
                return Err(Error::type_mismatch(
                    loc,
                    format!("{} wraps {}, which is itself a wrapper", name, alias.wraps),
                ))
            }
            Some(Export::Type(_)) => {
                return Err(Error::type_mismatch(
                    loc,
                    format!("{} wraps {}, which is not a graph or task", name, alias.wraps),
                ))
            }
            None => {
                return Err(Error::attribute_missing(
                    loc,
                    format!("{} wraps {}, which does not exist", name, alias.wraps),
                ))
            }
        },
    };

    Ok(Handle {
        name: name.to_string(),
        locator: Some(loc.to_string()),
        source_file: Some(module.source_file.clone()),
        target,
        catalog: module.catalog.clone(),
    })
}

fn canonical(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

//! Registry of every task and graph known to the process.
//!
//! Entries arrive eagerly (declarative registration at startup) or lazily
//! (a path-declared graph on its first introspection). Nothing is evicted.

use crate::handle::{GraphDef, Handle, TaskDef};
use crate::loader::DynamicLoader;
use crate::module::LoadedModule;
use dashmap::DashMap;
use davia_core::{EntryKind, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

struct Entry {
    seq: u64,
    handle: Arc<Handle>,
}

pub struct Registry {
    entries: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a handle. Replaces any entry with the same name but keeps
    /// its position in listings.
    pub fn register(&self, handle: Handle) -> Arc<Handle> {
        let handle = Arc::new(handle);
        let name = handle.name.clone();
        match self.entries.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                existing.get_mut().handle = handle.clone();
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Entry {
                    seq,
                    handle: handle.clone(),
                });
            }
        }
        info!("Registered {} '{}'", handle.kind(), name);
        handle
    }

    /// Declarative registration of an in-process task.
    pub fn register_task(
        &self,
        name: impl Into<String>,
        def: TaskDef,
        source_file: Option<&str>,
    ) -> Arc<Handle> {
        let mut handle = Handle::task(name, def);
        handle.source_file = source_file.map(str::to_string);
        self.register(handle)
    }

    /// Declarative registration of an in-process graph.
    pub fn register_graph(
        &self,
        name: impl Into<String>,
        def: GraphDef,
        source_file: Option<&str>,
    ) -> Arc<Handle> {
        let mut handle = Handle::graph(name, def);
        handle.source_file = source_file.map(str::to_string);
        self.register(handle)
    }

    /// Register every task and graph a module exports. Returns how many.
    pub fn register_module(&self, module: &LoadedModule) -> usize {
        let mut count = 0;
        for (name, def) in &module.manifest.graphs {
            self.register(self.module_handle(module, Handle::graph(name.clone(), def.clone())));
            count += 1;
        }
        for (name, def) in &module.manifest.tasks {
            self.register(self.module_handle(module, Handle::task(name.clone(), def.clone())));
            count += 1;
        }
        count
    }

    fn module_handle(&self, module: &LoadedModule, handle: Handle) -> Handle {
        handle
            .with_source_file(module.source_file.clone())
            .with_catalog(module.catalog.clone())
    }

    /// Return the graph registered as `name`, loading it from `locator` on
    /// first use.
    pub fn ensure_graph(
        &self,
        name: &str,
        locator: &str,
        loader: &DynamicLoader,
    ) -> Result<Arc<Handle>> {
        if let Some(handle) = self.lookup(name) {
            if handle.kind() == EntryKind::Graph {
                return Ok(handle);
            }
        }
        let mut handle = loader.load_graph(locator)?;
        handle.name = name.to_string();
        Ok(self.register(handle))
    }

    /// Re-read `locator` from disk and replace the graph registered as
    /// `name`, so edits to its manifest show up without a restart.
    pub fn refresh_graph(
        &self,
        name: &str,
        locator: &str,
        loader: &DynamicLoader,
    ) -> Result<Arc<Handle>> {
        let mut handle = loader.reload_graph(locator)?;
        handle.name = name.to_string();
        Ok(self.register(handle))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Handle>> {
        self.lookup(name)
            .ok_or_else(|| Error::NotFound(format!("no task or graph named '{}'", name)))
    }

    fn lookup(&self, name: &str) -> Option<Arc<Handle>> {
        self.entries.get(name).map(|e| e.handle.clone())
    }

    pub fn list_tasks(&self) -> Vec<Arc<Handle>> {
        self.list_kind(EntryKind::Task)
    }

    pub fn list_graphs(&self) -> Vec<Arc<Handle>> {
        self.list_kind(EntryKind::Graph)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn list_kind(&self, kind: EntryKind) -> Vec<Arc<Handle>> {
        let mut found: Vec<(u64, Arc<Handle>)> = self
            .entries
            .iter()
            .filter(|e| e.handle.kind() == kind)
            .map(|e| (e.seq, e.handle.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, h)| h).collect()
    }
}

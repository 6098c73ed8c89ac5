//! Module graph for on-demand serving and HMR invalidation.
//!
//! Nodes live in an append-only arena addressed by [`ModuleHandle`]; two maps
//! index them by public URL and by resolved id. Import edges are stored in
//! both directions and are only ever changed together, so
//! `b ∈ a.imported_modules ⇔ a ∈ b.importers` holds after every mutation.
//!
//! The graph never holds its lock across an `.await`: resolution happens
//! first, then the mutation is applied in one critical section.

use crate::error::{Error, Result};
use crate::plugin::{ResolvedId, TransformResult};
use crate::url::clean_url;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Narrow resolution capability the graph needs: URL → canonical id.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Resolve a request URL; `None` means the URL is its own id.
    async fn resolve_url(&self, url: &str) -> Result<Option<ResolvedId>>;
}

/// Stable identity of a module within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleHandle(u32);

impl ModuleHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in the module graph.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Public request path (e.g., `/src/App.tsx`).
    pub url: String,
    /// Resolved id (e.g., `/project/src/App.tsx`). Nodes are created after
    /// resolution, so this is always known.
    pub id: String,
    /// Modules this module imports.
    pub imported_modules: FxHashSet<ModuleHandle>,
    /// Modules that import this module.
    pub importers: FxHashSet<ModuleHandle>,
    /// Last transform output; `None` when never computed or invalidated.
    pub transform_result: Option<Arc<TransformResult>>,
    /// Graph version of the last invalidation, `0` if never invalidated.
    pub last_invalidated_at: u64,
}

impl ModuleNode {
    fn new(url: String, id: String) -> Self {
        Self {
            url,
            id,
            imported_modules: FxHashSet::default(),
            importers: FxHashSet::default(),
            transform_result: None,
            last_invalidated_at: 0,
        }
    }
}

/// An import discovered for a module: a URL still to be resolved, or a
/// module already known to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportTarget {
    Url(String),
    Module(ModuleHandle),
}

impl From<String> for ImportTarget {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&str> for ImportTarget {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<ModuleHandle> for ImportTarget {
    fn from(handle: ModuleHandle) -> Self {
        Self::Module(handle)
    }
}

/// Outcome of one invalidation cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Graph version stamped on every invalidated module.
    pub timestamp: u64,
    /// Invalidated modules, the changed module first. Each appears once.
    pub modules: Vec<ModuleHandle>,
}

/// Serialisable view of the graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub version: u64,
    pub modules: Vec<ModuleSnapshot>,
}

/// Serialisable view of one module; edges are listed by URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSnapshot {
    pub url: String,
    pub id: String,
    pub imported_modules: Vec<String>,
    pub importers: Vec<String>,
    pub cached: bool,
    pub last_invalidated_at: u64,
}

#[derive(Default)]
struct GraphState {
    nodes: Vec<ModuleNode>,
    url_to_module: FxHashMap<String, ModuleHandle>,
    id_to_module: FxHashMap<String, ModuleHandle>,
    version: u64,
}

impl GraphState {
    fn node(&self, handle: ModuleHandle) -> Result<&ModuleNode> {
        self.nodes
            .get(handle.index())
            .ok_or(Error::UnknownModule(handle))
    }

    fn node_mut(&mut self, handle: ModuleHandle) -> Result<&mut ModuleNode> {
        self.nodes
            .get_mut(handle.index())
            .ok_or(Error::UnknownModule(handle))
    }

    fn insert(&mut self, url: &str, id: String) -> ModuleHandle {
        let handle = ModuleHandle(self.nodes.len() as u32);
        self.nodes.push(ModuleNode::new(url.to_string(), id.clone()));
        self.url_to_module.insert(url.to_string(), handle);
        self.id_to_module.insert(id, handle);
        handle
    }

    /// Replace `module`'s outgoing edges with `next`.
    ///
    /// The removed and added sets are computed before anything is mutated,
    /// then each edge is changed in both directions at once.
    fn set_imports(&mut self, module: ModuleHandle, next: &FxHashSet<ModuleHandle>) -> Result<()> {
        for dep in next {
            self.node(*dep)?;
        }
        let prev = &self.node(module)?.imported_modules;
        let removed: Vec<ModuleHandle> = prev.difference(next).copied().collect();
        let added: Vec<ModuleHandle> = next.difference(prev).copied().collect();

        for dep in removed {
            self.nodes[module.index()].imported_modules.remove(&dep);
            self.nodes[dep.index()].importers.remove(&module);
        }
        for dep in added {
            self.nodes[module.index()].imported_modules.insert(dep);
            self.nodes[dep.index()].importers.insert(module);
        }
        Ok(())
    }
}

/// The module dependency graph.
pub struct ModuleGraph {
    resolver: Arc<dyn UrlResolver>,
    state: Mutex<GraphState>,
    /// In-flight `ensure_entry` creations, one shared cell per URL.
    pending: Mutex<FxHashMap<String, Arc<OnceCell<ModuleHandle>>>>,
}

impl ModuleGraph {
    /// Create an empty graph resolving URLs through `resolver`.
    pub fn new(resolver: Arc<dyn UrlResolver>) -> Self {
        Self {
            resolver,
            state: Mutex::new(GraphState::default()),
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    async fn resolve(&self, url: &str) -> Result<String> {
        let resolved = self.resolver.resolve_url(url).await?;
        Ok(resolved.map_or_else(|| url.to_string(), |r| clean_url(&r.id).to_string()))
    }

    /// Return the module for `url`, creating and registering it on first use.
    ///
    /// Concurrent calls for the same URL share a single creation. A URL that
    /// resolves to the id of an existing module returns that module.
    pub async fn ensure_entry(&self, raw_url: &str) -> Result<ModuleHandle> {
        let url = clean_url(raw_url);
        if let Some(handle) = self.state.lock().url_to_module.get(url).copied() {
            return Ok(handle);
        }

        let cell = Arc::clone(self.pending.lock().entry(url.to_string()).or_default());
        let result = cell
            .get_or_try_init(|| self.create_entry(url))
            .await
            .copied();

        let mut pending = self.pending.lock();
        if pending.get(url).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            pending.remove(url);
        }
        result
    }

    async fn create_entry(&self, url: &str) -> Result<ModuleHandle> {
        let id = self.resolve(url).await?;
        let mut state = self.state.lock();
        if let Some(handle) = state.url_to_module.get(url).copied() {
            return Ok(handle);
        }
        if let Some(handle) = state.id_to_module.get(&id).copied() {
            return Ok(handle);
        }
        let handle = state.insert(url, id);
        tracing::trace!(url, module = %handle, "module registered");
        Ok(handle)
    }

    /// Look up a module by URL, resolving it the same way `ensure_entry` does.
    pub async fn get_by_url(&self, raw_url: &str) -> Result<Option<ModuleHandle>> {
        let url = clean_url(raw_url);
        if let Some(handle) = self.state.lock().url_to_module.get(url).copied() {
            return Ok(Some(handle));
        }
        let id = self.resolve(url).await?;
        Ok(self.state.lock().id_to_module.get(&id).copied())
    }

    /// Look up a module by resolved id.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<ModuleHandle> {
        self.state.lock().id_to_module.get(clean_url(id)).copied()
    }

    /// Replace the imports of `module` with `imports`.
    ///
    /// URL targets are registered via `ensure_entry`; edges to modules no
    /// longer imported are removed from both sides.
    pub async fn update_imports(&self, module: ModuleHandle, imports: Vec<ImportTarget>) -> Result<()> {
        let mut next = FxHashSet::default();
        for target in imports {
            let dep = match target {
                ImportTarget::Module(handle) => handle,
                ImportTarget::Url(url) => self.ensure_entry(&url).await?,
            };
            next.insert(dep);
        }
        self.state.lock().set_imports(module, &next)
    }

    /// Invalidate the module with `id` and, transitively, all its importers.
    ///
    /// Returns `None` when no module has that id.
    pub fn invalidate(&self, id: &str) -> Option<Invalidation> {
        let handle = self.get_by_id(id)?;
        self.invalidate_module(handle).ok()
    }

    /// Invalidate `module` and, transitively, all its importers.
    ///
    /// Every affected module gets the same new version and loses its cached
    /// output. Import cycles are visited once.
    pub fn invalidate_module(&self, module: ModuleHandle) -> Result<Invalidation> {
        let mut state = self.state.lock();
        state.node(module)?;
        state.version += 1;
        let timestamp = state.version;

        let mut visited = FxHashSet::default();
        let mut modules = Vec::new();
        let mut stack = vec![module];
        while let Some(handle) = stack.pop() {
            if !visited.insert(handle) {
                continue;
            }
            let node = &mut state.nodes[handle.index()];
            node.last_invalidated_at = timestamp;
            node.transform_result = None;
            modules.push(handle);
            stack.extend(node.importers.iter().filter(|i| !visited.contains(*i)));
        }

        Ok(Invalidation { timestamp, modules })
    }

    /// Cached transform output of `module`.
    #[must_use]
    pub fn cached_output(&self, module: ModuleHandle) -> Option<Arc<TransformResult>> {
        let state = self.state.lock();
        state.node(module).ok()?.transform_result.clone()
    }

    /// Store transform output unless `module` was invalidated since
    /// `seen_version` was read. Returns whether the output was stored.
    pub fn store_output(
        &self,
        module: ModuleHandle,
        seen_version: u64,
        output: Arc<TransformResult>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let node = state.node_mut(module)?;
        if node.last_invalidated_at != seen_version {
            return Ok(false);
        }
        node.transform_result = Some(output);
        Ok(true)
    }

    /// Invalidation version of `module` (`0` if never invalidated).
    #[must_use]
    pub fn last_invalidated_at(&self, module: ModuleHandle) -> Option<u64> {
        let state = self.state.lock();
        state.node(module).ok().map(|n| n.last_invalidated_at)
    }

    /// A copy of the node behind `module`.
    #[must_use]
    pub fn module(&self, module: ModuleHandle) -> Option<ModuleNode> {
        self.state.lock().node(module).ok().cloned()
    }

    /// Public URL of `module`.
    #[must_use]
    pub fn url(&self, module: ModuleHandle) -> Option<String> {
        self.state.lock().node(module).ok().map(|n| n.url.clone())
    }

    /// Current graph version (number of invalidations so far).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// All module handles in creation order.
    #[must_use]
    pub fn handles(&self) -> Vec<ModuleHandle> {
        (0..self.len() as u32).map(ModuleHandle).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialisable view of all nodes and edges.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.lock();
        let urls = |set: &FxHashSet<ModuleHandle>| {
            let mut urls: Vec<String> = set
                .iter()
                .map(|h| state.nodes[h.index()].url.clone())
                .collect();
            urls.sort();
            urls
        };
        let modules = state
            .nodes
            .iter()
            .map(|node| ModuleSnapshot {
                url: node.url.clone(),
                id: node.id.clone(),
                imported_modules: urls(&node.imported_modules),
                importers: urls(&node.importers),
                cached: node.transform_result.is_some(),
                last_invalidated_at: node.last_invalidated_at,
            })
            .collect();
        GraphSnapshot {
            version: state.version,
            modules,
        }
    }
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ModuleGraph")
            .field("modules", &state.nodes.len())
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

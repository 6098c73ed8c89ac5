//! Plugin pipeline.
//!
//! A Rollup-style collaborator chain. Each [`Plugin`] has three optional
//! capability slots (`resolve_id`, `load`, `transform`); the
//! [`PluginContainer`] composes them:
//!
//! - `resolve_id` and `load` are *first match*: the first plugin returning
//!   `Some` wins and the rest are not consulted.
//! - `transform` is a *sequential reduction*: every transform hook runs in
//!   order on the previous hook's output; `None` passes the code through.
//!
//! ## Example
//!
//! ```ignore
//! use nobundle_core::plugin::{Plugin, PluginContext, TransformHook, TransformResult};
//!
//! struct Banner;
//!
//! #[async_trait::async_trait]
//! impl TransformHook for Banner {
//!     async fn transform(&self, code: &str, _id: &str, _ctx: &PluginContext<'_>)
//!         -> nobundle_core::Result<Option<TransformResult>> {
//!         Ok(Some(format!("/* dev */\n{code}").into()))
//!     }
//! }
//!
//! let plugin = Plugin::new("banner").with_transform(Banner);
//! ```

use crate::error::Result;
use crate::graph::{ModuleGraph, UrlResolver};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, OnceLock, Weak};

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T>;

/// Result of a resolve hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Resolved module id (usually an absolute file path).
    pub id: String,
}

impl ResolvedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl From<String> for ResolvedId {
    fn from(id: String) -> Self {
        Self { id }
    }
}

impl From<&str> for ResolvedId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Result of a load hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// Module source code.
    pub code: String,
    /// Optional source map.
    pub map: Option<String>,
}

impl LoadResult {
    /// Create a load result with code only.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

impl From<String> for LoadResult {
    fn from(code: String) -> Self {
        Self::code(code)
    }
}

/// Result of a transform hook, and the cached output of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Transformed code.
    pub code: String,
    /// Optional source map.
    pub map: Option<String>,
}

impl TransformResult {
    /// Create a transform result with code only.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

impl From<String> for TransformResult {
    fn from(code: String) -> Self {
        Self::code(code)
    }
}

impl From<&str> for TransformResult {
    fn from(code: &str) -> Self {
        Self::code(code)
    }
}

/// Plugin enforcement ordering.
///
/// Controls where a plugin runs relative to others in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    /// Runs before normal plugins (e.g., alias resolution).
    Pre,
    /// Default ordering.
    #[default]
    Normal,
    /// Runs after normal plugins.
    Post,
}

/// Per-call context handed to every hook of one pipeline operation.
pub struct PluginContext<'a> {
    container: &'a PluginContainer,
}

impl<'a> PluginContext<'a> {
    /// Re-enter the pipeline's `resolve_id`.
    ///
    /// Lets a plugin perform a sub-resolution (e.g. after rewriting an alias)
    /// without re-implementing resolution.
    pub fn resolve<'b>(
        &'b self,
        specifier: &'b str,
        importer: Option<&'b str>,
    ) -> BoxFuture<'b, HookResult<Option<ResolvedId>>> {
        self.container.resolve_id(specifier, importer).boxed()
    }

    /// The module graph the pipeline is attached to, if any.
    #[must_use]
    pub fn graph(&self) -> Option<Arc<ModuleGraph>> {
        self.container.graph()
    }
}

/// Resolve capability: specifier (+ importer) → id.
#[async_trait]
pub trait ResolveHook: Send + Sync {
    /// Return `Some` to claim the specifier, `None` to defer to the next plugin.
    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &PluginContext<'_>,
    ) -> HookResult<Option<ResolvedId>>;
}

/// Load capability: id → raw content.
#[async_trait]
pub trait LoadHook: Send + Sync {
    /// Return `Some` to provide the source, `None` to defer to the next plugin.
    async fn load(&self, id: &str, ctx: &PluginContext<'_>) -> HookResult<Option<LoadResult>>;
}

/// Transform capability: (code, id) → code.
#[async_trait]
pub trait TransformHook: Send + Sync {
    /// Return `Some` to replace the code, `None` to pass it through.
    async fn transform(
        &self,
        code: &str,
        id: &str,
        ctx: &PluginContext<'_>,
    ) -> HookResult<Option<TransformResult>>;
}

#[async_trait]
impl<T: ResolveHook + ?Sized> ResolveHook for Arc<T> {
    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &PluginContext<'_>,
    ) -> HookResult<Option<ResolvedId>> {
        (**self).resolve_id(specifier, importer, ctx).await
    }
}

#[async_trait]
impl<T: LoadHook + ?Sized> LoadHook for Arc<T> {
    async fn load(&self, id: &str, ctx: &PluginContext<'_>) -> HookResult<Option<LoadResult>> {
        (**self).load(id, ctx).await
    }
}

#[async_trait]
impl<T: TransformHook + ?Sized> TransformHook for Arc<T> {
    async fn transform(
        &self,
        code: &str,
        id: &str,
        ctx: &PluginContext<'_>,
    ) -> HookResult<Option<TransformResult>> {
        (**self).transform(code, id, ctx).await
    }
}

/// A named collaborator with three optional capability slots.
pub struct Plugin {
    name: String,
    enforce: PluginEnforce,
    resolve: Option<Arc<dyn ResolveHook>>,
    load: Option<Arc<dyn LoadHook>>,
    transform: Option<Arc<dyn TransformHook>>,
}

impl Plugin {
    /// Create a plugin with no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enforce: PluginEnforce::Normal,
            resolve: None,
            load: None,
            transform: None,
        }
    }

    /// Set the enforcement level.
    pub fn with_enforce(mut self, enforce: PluginEnforce) -> Self {
        self.enforce = enforce;
        self
    }

    /// Fill the resolve slot.
    pub fn with_resolve(mut self, hook: impl ResolveHook + 'static) -> Self {
        self.resolve = Some(Arc::new(hook));
        self
    }

    /// Fill the load slot.
    pub fn with_load(mut self, hook: impl LoadHook + 'static) -> Self {
        self.load = Some(Arc::new(hook));
        self
    }

    /// Fill the transform slot.
    pub fn with_transform(mut self, hook: impl TransformHook + 'static) -> Self {
        self.transform = Some(Arc::new(hook));
        self
    }

    /// Plugin name for debugging and error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn enforce(&self) -> PluginEnforce {
        self.enforce
    }

    #[must_use]
    pub fn has_resolve(&self) -> bool {
        self.resolve.is_some()
    }

    #[must_use]
    pub fn has_load(&self) -> bool {
        self.load.is_some()
    }

    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("enforce", &self.enforce)
            .field("resolve", &self.has_resolve())
            .field("load", &self.has_load())
            .field("transform", &self.has_transform())
            .finish()
    }
}

/// An ordered chain of plugins.
///
/// Plugins are sorted by their enforce level: `Pre` → `Normal` → `Post`.
/// Within the same level, insertion order is preserved.
pub struct PluginContainer {
    plugins: Vec<Plugin>,
    graph: OnceLock<Weak<ModuleGraph>>,
}

impl PluginContainer {
    /// Create a container from plugins in their intended order.
    pub fn new(mut plugins: Vec<Plugin>) -> Self {
        plugins.sort_by_key(Plugin::enforce);
        Self {
            plugins,
            graph: OnceLock::new(),
        }
    }

    /// Attach the module graph exposed to hooks via [`PluginContext::graph`].
    ///
    /// The graph owns the container (for resolution), so only a weak
    /// reference is kept here. Binding twice keeps the first graph.
    pub fn bind_graph(&self, graph: &Arc<ModuleGraph>) {
        if self.graph.set(Arc::downgrade(graph)).is_err() {
            tracing::warn!("plugin container is already bound to a module graph");
        }
    }

    /// The bound module graph, if it is still alive.
    #[must_use]
    pub fn graph(&self) -> Option<Arc<ModuleGraph>> {
        self.graph.get().and_then(Weak::upgrade)
    }

    /// Plugin names in execution order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(Plugin::name).collect()
    }

    /// Check if any plugins are registered.
    #[must_use]
    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty()
    }

    fn context(&self) -> PluginContext<'_> {
        PluginContext { container: self }
    }

    /// Resolve a specifier through the first plugin that claims it.
    pub async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> HookResult<Option<ResolvedId>> {
        let ctx = self.context();
        for plugin in &self.plugins {
            let Some(hook) = &plugin.resolve else {
                continue;
            };
            let resolved = hook
                .resolve_id(specifier, importer, &ctx)
                .await
                .map_err(|e| e.in_plugin(&plugin.name, "resolve_id"))?;
            if let Some(resolved) = resolved {
                tracing::trace!(plugin = %plugin.name, specifier, id = %resolved.id, "resolved");
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Load an id through the first plugin that provides it.
    pub async fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        let ctx = self.context();
        for plugin in &self.plugins {
            let Some(hook) = &plugin.load else {
                continue;
            };
            let loaded = hook
                .load(id, &ctx)
                .await
                .map_err(|e| e.in_plugin(&plugin.name, "load"))?;
            if loaded.is_some() {
                tracing::trace!(plugin = %plugin.name, id, "loaded");
                return Ok(loaded);
            }
        }
        Ok(None)
    }

    /// Transform code through all plugins.
    /// Each plugin's output is passed to the next plugin.
    pub async fn transform(&self, code: &str, id: &str) -> HookResult<TransformResult> {
        let ctx = self.context();
        let mut current = TransformResult::code(code);
        for plugin in &self.plugins {
            let Some(hook) = &plugin.transform else {
                continue;
            };
            let transformed = hook
                .transform(&current.code, id, &ctx)
                .await
                .map_err(|e| e.in_plugin(&plugin.name, "transform"))?;
            if let Some(result) = transformed {
                current.code = result.code;
                if result.map.is_some() {
                    current.map = result.map;
                }
            }
        }
        Ok(current)
    }
}

impl Default for PluginContainer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContainer")
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UrlResolver for PluginContainer {
    async fn resolve_url(&self, url: &str) -> Result<Option<ResolvedId>> {
        self.resolve_id(url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver returning a fixed answer and counting its calls.
    struct FixedResolver {
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedResolver {
        fn new(answer: Option<&'static str>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    answer,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ResolveHook for FixedResolver {
        async fn resolve_id(
            &self,
            _specifier: &str,
            _importer: Option<&str>,
            _ctx: &PluginContext<'_>,
        ) -> HookResult<Option<ResolvedId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.map(ResolvedId::from))
        }
    }

    struct Append(&'static str);

    #[async_trait]
    impl TransformHook for Append {
        async fn transform(
            &self,
            code: &str,
            _id: &str,
            _ctx: &PluginContext<'_>,
        ) -> HookResult<Option<TransformResult>> {
            Ok(Some(format!("{code}{}", self.0).into()))
        }
    }

    struct PassThrough;

    #[async_trait]
    impl TransformHook for PassThrough {
        async fn transform(
            &self,
            _code: &str,
            _id: &str,
            _ctx: &PluginContext<'_>,
        ) -> HookResult<Option<TransformResult>> {
            Ok(None)
        }
    }

    struct Failing;

    #[async_trait]
    impl TransformHook for Failing {
        async fn transform(
            &self,
            _code: &str,
            _id: &str,
            _ctx: &PluginContext<'_>,
        ) -> HookResult<Option<TransformResult>> {
            Err(Error::other("syntax error"))
        }
    }

    struct StaticLoader(&'static str, &'static str);

    #[async_trait]
    impl LoadHook for StaticLoader {
        async fn load(&self, id: &str, _ctx: &PluginContext<'_>) -> HookResult<Option<LoadResult>> {
            Ok((id == self.0).then(|| LoadResult::code(self.1)))
        }
    }

    /// Resolves `@/x` by re-entering the pipeline with `/src/x`.
    struct Reentrant;

    #[async_trait]
    impl ResolveHook for Reentrant {
        async fn resolve_id(
            &self,
            specifier: &str,
            importer: Option<&str>,
            ctx: &PluginContext<'_>,
        ) -> HookResult<Option<ResolvedId>> {
            let Some(rest) = specifier.strip_prefix("@/") else {
                return Ok(None);
            };
            let target = format!("/src/{rest}");
            ctx.resolve(&target, importer).await
        }
    }

    struct SrcResolver;

    #[async_trait]
    impl ResolveHook for SrcResolver {
        async fn resolve_id(
            &self,
            specifier: &str,
            _importer: Option<&str>,
            _ctx: &PluginContext<'_>,
        ) -> HookResult<Option<ResolvedId>> {
            Ok(specifier
                .starts_with("/src/")
                .then(|| ResolvedId::new(format!("/project{specifier}"))))
        }
    }

    #[tokio::test]
    async fn test_resolve_first_match_wins() {
        let (p1, c1) = FixedResolver::new(None);
        let (p2, c2) = FixedResolver::new(Some("X"));
        let (p3, c3) = FixedResolver::new(Some("Y"));
        let container = PluginContainer::new(vec![
            Plugin::new("p1").with_resolve(p1),
            Plugin::new("p2").with_resolve(p2),
            Plugin::new("p3").with_resolve(p3),
        ]);

        let resolved = container.resolve_id("anything", None).await.unwrap();
        assert_eq!(resolved, Some(ResolvedId::new("X")));
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_none_when_unclaimed() {
        let (p1, _) = FixedResolver::new(None);
        let container = PluginContainer::new(vec![
            Plugin::new("transform-only").with_transform(PassThrough),
            Plugin::new("p1").with_resolve(p1),
        ]);
        assert_eq!(container.resolve_id("x", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_first_match_wins() {
        let container = PluginContainer::new(vec![
            Plugin::new("a").with_load(StaticLoader("/a.js", "a")),
            Plugin::new("b").with_load(StaticLoader("/b.js", "b")),
            Plugin::new("b2").with_load(StaticLoader("/b.js", "shadowed")),
        ]);
        assert_eq!(container.load("/b.js").await.unwrap().unwrap().code, "b");
        assert!(container.load("/c.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transform_sequential_composition() {
        let container = PluginContainer::new(vec![
            Plugin::new("t1").with_transform(Append("a")),
            Plugin::new("skip").with_transform(PassThrough),
            Plugin::new("t2").with_transform(Append("b")),
        ]);
        let result = container.transform("", "/x.js").await.unwrap();
        assert_eq!(result.code, "ab");
    }

    #[tokio::test]
    async fn test_transform_without_hooks_returns_input() {
        let container = PluginContainer::default();
        let result = container.transform("const x = 1;", "/x.js").await.unwrap();
        assert_eq!(result.code, "const x = 1;");
    }

    #[tokio::test]
    async fn test_enforce_ordering_is_stable() {
        let container = PluginContainer::new(vec![
            Plugin::new("post").with_enforce(PluginEnforce::Post).with_transform(Append("3")),
            Plugin::new("normal-1").with_transform(Append("1")),
            Plugin::new("pre").with_enforce(PluginEnforce::Pre).with_transform(Append("0")),
            Plugin::new("normal-2").with_transform(Append("2")),
        ]);
        assert_eq!(
            container.plugin_names(),
            vec!["pre", "normal-1", "normal-2", "post"]
        );
        assert_eq!(container.transform("", "/x.js").await.unwrap().code, "0123");
    }

    #[tokio::test]
    async fn test_transform_error_propagates_with_plugin_name() {
        let container = PluginContainer::new(vec![
            Plugin::new("t1").with_transform(Append("a")),
            Plugin::new("broken").with_transform(Failing),
            Plugin::new("t2").with_transform(Append("b")),
        ]);
        let err = container.transform("", "/x.js").await.unwrap_err();
        match err {
            Error::Plugin(e) => {
                assert_eq!(e.plugin, "broken");
                assert_eq!(e.hook, "transform");
                assert_eq!(e.message, "syntax error");
            }
            other => panic!("expected plugin error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_context_resolve_reenters_pipeline() {
        let container = PluginContainer::new(vec![
            Plugin::new("alias").with_resolve(Reentrant),
            Plugin::new("src").with_resolve(SrcResolver),
        ]);
        let resolved = container.resolve_id("@/App.tsx", None).await.unwrap();
        assert_eq!(resolved, Some(ResolvedId::new("/project/src/App.tsx")));
    }

    #[test]
    fn test_capability_slots() {
        let plugin = Plugin::new("loader").with_load(StaticLoader("/a", "a"));
        assert!(plugin.has_load());
        assert!(!plugin.has_resolve());
        assert!(!plugin.has_transform());
        assert_eq!(plugin.enforce(), PluginEnforce::Normal);
    }
}

//! Import rewriting for unbundled dev serving.
//!
//! Rewrites every import/export specifier of a served module to a URL the
//! browser can fetch:
//! - Runtime-internal specifiers (`/@nobundle/client`) → untouched
//! - Assets (`./logo.svg`) → `/src/logo.svg?import`
//! - Bare specifiers (`react`) → `/node_modules/.nobundle/react.js`
//! - Relative/absolute/aliased imports (`./App`) → `/src/App.tsx`, plus
//!   `?t=<version>` once the target has been invalidated
//!
//! The rewritten targets are reported to the module graph as the module's
//! current imports, and instrumented modules get an `import.meta.hot`
//! bootstrap.

use crate::config::DevConfig;
use crate::error::Result;
use crate::graph::{ImportTarget, ModuleGraph};
use crate::plugin::{Plugin, PluginContext, PluginEnforce, TransformHook, TransformResult};
use crate::scan::scan_imports;
use crate::url::{
    clean_url, inject_query, is_asset_path, is_bare_import, is_css_request, is_import_request,
    is_internal_request, is_js_request, short_name, IMPORT_QUERY,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Local name the bootstrap binds `createHotContext` to.
const HOT_CONTEXT_BINDING: &str = "__nobundle__createHotContext";

/// Source after rewriting, with the URLs it now imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub code: String,
    /// Rewritten import URLs in source order (may repeat).
    pub imports: Vec<String>,
}

/// Transform stage that rewrites imports and keeps the graph's edges current.
pub struct ImportAnalysisPlugin {
    config: Arc<DevConfig>,
}

impl ImportAnalysisPlugin {
    /// Create a new import analysis plugin.
    #[must_use]
    pub fn new(config: Arc<DevConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        Plugin::new("import-analysis")
            .with_enforce(PluginEnforce::Post)
            .with_transform(self)
    }

    /// Rewrite the specifiers in `code`, a module with resolved id `importer`.
    pub async fn rewrite(
        &self,
        code: &str,
        importer: &str,
        ctx: &PluginContext<'_>,
    ) -> Result<RewriteOutput> {
        let graph = ctx.graph();
        let mut imports = Vec::new();
        let mut edits = Vec::new();

        for found in scan_imports(code) {
            let specifier = found.specifier.as_str();
            if specifier.is_empty()
                || is_internal_request(specifier, &self.config.client_public_path)
            {
                continue;
            }

            let url = if is_asset_path(specifier) {
                match self.resolve_url(specifier, importer, ctx, graph.as_deref()).await? {
                    Some(url) => inject_query(&url, IMPORT_QUERY),
                    None => continue,
                }
            } else if is_bare_import(specifier) && !self.config.is_aliased(specifier) {
                self.config.prebundle_url(specifier)
            } else if specifier.starts_with('.')
                || specifier.starts_with('/')
                || self.config.is_aliased(specifier)
            {
                let Some(url) = self.resolve_url(specifier, importer, ctx, graph.as_deref()).await?
                else {
                    tracing::debug!(specifier, importer, "unresolved import left as written");
                    continue;
                };
                // JSON and other non-script targets must be fetched as modules.
                if is_js_request(&url) || is_css_request(&url) || is_import_request(&url) {
                    url
                } else {
                    inject_query(&url, IMPORT_QUERY)
                }
            } else {
                continue;
            };

            imports.push(url.clone());
            edits.push((found.start, found.end, url));
        }

        Ok(RewriteOutput {
            code: apply_edits(code, &edits),
            imports,
        })
    }

    /// Resolve a specifier to its public URL, cache-busted when the target
    /// module has been invalidated.
    async fn resolve_url(
        &self,
        specifier: &str,
        importer: &str,
        ctx: &PluginContext<'_>,
        graph: Option<&ModuleGraph>,
    ) -> Result<Option<String>> {
        let Some(resolved) = ctx.resolve(specifier, Some(importer)).await? else {
            return Ok(None);
        };
        let url = short_name(&resolved.id, &self.config.root);
        let version = graph
            .and_then(|g| g.get_by_id(&resolved.id).and_then(|m| g.last_invalidated_at(m)))
            .unwrap_or(0);
        if version > 0 {
            return Ok(Some(inject_query(&url, &format!("t={version}"))));
        }
        Ok(Some(url))
    }

    /// Snippet that binds `import.meta.hot` for the module served at `url`.
    fn bootstrap(&self, url: &str) -> String {
        let url = serde_json::Value::from(clean_url(url));
        format!(
            "import {{ createHotContext as {HOT_CONTEXT_BINDING} }} from \"{client}\";\
             import.meta.hot = {HOT_CONTEXT_BINDING}({url});",
            client = self.config.client_public_path,
        )
    }
}

#[async_trait]
impl TransformHook for ImportAnalysisPlugin {
    async fn transform(
        &self,
        code: &str,
        id: &str,
        ctx: &PluginContext<'_>,
    ) -> Result<Option<TransformResult>> {
        if !(is_js_request(id) || is_css_request(id))
            || is_internal_request(id, &self.config.client_public_path)
        {
            return Ok(None);
        }

        let output = self.rewrite(code, id, ctx).await?;
        let graph = ctx.graph();
        let module = graph.as_ref().and_then(|g| g.get_by_id(id));

        let mut code = output.code;
        if !self.config.is_no_instrument(id) {
            let url = match (&graph, module) {
                (Some(graph), Some(module)) => graph.url(module),
                _ => None,
            };
            let url = url.unwrap_or_else(|| short_name(id, &self.config.root));
            code.insert_str(0, &self.bootstrap(&url));
        }

        match (graph, module) {
            (Some(graph), Some(module)) => {
                let targets = output.imports.into_iter().map(ImportTarget::Url).collect();
                graph.update_imports(module, targets).await?;
            }
            _ => tracing::warn!(id, "module is not in the graph; import edges not recorded"),
        }

        Ok(Some(TransformResult::code(code)))
    }
}

/// Replace each `(start, end)` byte span with its text. Spans must be sorted
/// and non-overlapping.
fn apply_edits(code: &str, edits: &[(usize, usize, String)]) -> String {
    let mut out = String::with_capacity(code.len() + edits.len() * 16);
    let mut last = 0;
    for (start, end, text) in edits {
        out.push_str(&code[last..*start]);
        out.push_str(text);
        last = *end;
    }
    out.push_str(&code[last..]);
    out
}

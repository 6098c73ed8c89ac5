//! Per-request module transformation pipeline for unbundled dev serving.
//!
//! Handles: clean URL → cache lookup → resolve → load → graph entry →
//! transform → cache.

use crate::error::Result;
use crate::graph::ModuleGraph;
use crate::plugin::{PluginContainer, TransformResult};
use crate::url::clean_url;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Content type of every transformed module.
pub const JS_CONTENT_TYPE: &str = "application/javascript";

/// Outcome of a dev request, independent of the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevResponse {
    /// Serve the transformed module.
    Ok {
        body: String,
        content_type: &'static str,
    },
    /// Not handled here; fall through to static/HTML serving.
    Next,
    /// The pipeline failed.
    Error { status: u16, message: String },
}

/// Transform a module for serving.
///
/// Returns `None` when the URL cannot be resolved or loaded. The graph node
/// is created before transforming so import analysis can record edges on
/// it. The result is cached unless the module was invalidated while it was
/// being computed.
pub async fn transform_request(
    raw_url: &str,
    container: &PluginContainer,
    graph: &ModuleGraph,
) -> Result<Option<Arc<TransformResult>>> {
    let url = clean_url(raw_url);
    let start = Instant::now();

    let existing = graph.get_by_url(url).await?;
    if let Some(cached) = existing.and_then(|m| graph.cached_output(m)) {
        debug!(url, "cache hit");
        return Ok(Some(cached));
    }
    let seen_version = existing.and_then(|m| graph.last_invalidated_at(m));

    let Some(resolved) = container.resolve_id(url, None).await? else {
        debug!(url, "unresolved");
        return Ok(None);
    };
    let loaded = container.load(&resolved.id).await?;

    let module = graph.ensure_entry(url).await?;
    let Some(loaded) = loaded else {
        debug!(url, id = %resolved.id, "nothing loaded");
        return Ok(None);
    };
    let seen_version = seen_version
        .or_else(|| graph.last_invalidated_at(module))
        .unwrap_or(0);

    let mut result = container.transform(&loaded.code, &resolved.id).await?;
    if result.map.is_none() {
        result.map = loaded.map;
    }
    let result = Arc::new(result);

    if !graph.store_output(module, seen_version, Arc::clone(&result))? {
        debug!(url, "invalidated during transform; result not cached");
    }
    debug!(
        url,
        id = %resolved.id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "transformed"
    );
    Ok(Some(result))
}

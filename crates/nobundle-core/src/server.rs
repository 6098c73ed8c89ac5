//! Dev server core.
//!
//! Wires the plugin pipeline, the module graph and the HMR controller
//! together. Transport (HTTP, WebSocket, file watching) stays outside: the
//! embedding server calls [`DevServer::handle_request`] for requests and
//! [`DevServer::handle_file_change`] for watcher events.

use crate::config::DevConfig;
use crate::error::Result;
use crate::graph::{Invalidation, ModuleGraph};
use crate::hmr::{FileChange, HmrController, HmrPayload, HmrSink};
use crate::plugin::{Plugin, PluginContainer, TransformResult};
use crate::plugins::default_plugins;
use crate::transform::{transform_request, DevResponse, JS_CONTENT_TYPE};
use crate::url::{clean_url, is_css_request, is_import_request, is_js_request};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error};

/// On-demand module server.
pub struct DevServer {
    config: Arc<DevConfig>,
    container: Arc<PluginContainer>,
    graph: Arc<ModuleGraph>,
    hmr: HmrController,
    sink: Arc<dyn HmrSink>,
}

impl DevServer {
    /// Create a server with the built-in plugins plus `user_plugins`.
    pub fn new(config: DevConfig, user_plugins: Vec<Plugin>, sink: Arc<dyn HmrSink>) -> Self {
        let config = Arc::new(config);
        let plugins = default_plugins(&config, user_plugins);
        Self::with_plugins(config, plugins, sink)
    }

    /// Create a server running exactly `plugins`.
    pub fn with_plugins(
        config: Arc<DevConfig>,
        plugins: Vec<Plugin>,
        sink: Arc<dyn HmrSink>,
    ) -> Self {
        let container = Arc::new(PluginContainer::new(plugins));
        let graph = Arc::new(ModuleGraph::new(container.clone()));
        container.bind_graph(&graph);
        let hmr = HmrController::new(graph.clone(), config.root.clone(), sink.clone());
        debug!(plugins = ?container.plugin_names(), "dev server ready");
        Self {
            config,
            container,
            graph,
            hmr,
            sink,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DevConfig {
        &self.config
    }

    #[must_use]
    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.graph
    }

    #[must_use]
    pub fn container(&self) -> &Arc<PluginContainer> {
        &self.container
    }

    /// Run the request pipeline for `url`.
    pub async fn transform_request(&self, url: &str) -> Result<Option<Arc<TransformResult>>> {
        transform_request(url, &self.container, &self.graph).await
    }

    /// Answer a request the way the dev middleware would.
    ///
    /// Only `GET` requests for scripts, stylesheets and `?import` assets go
    /// through the pipeline; everything else, and pipeline misses, fall
    /// through. Failures are also pushed to clients as an HMR error.
    pub async fn handle_request(&self, method: &str, url: &str) -> DevResponse {
        if !method.eq_ignore_ascii_case("GET") {
            return DevResponse::Next;
        }
        if !(is_js_request(url) || is_css_request(url) || is_import_request(url)) {
            return DevResponse::Next;
        }

        match self.transform_request(url).await {
            Ok(Some(result)) => DevResponse::Ok {
                body: result.code.clone(),
                content_type: JS_CONTENT_TYPE,
            },
            Ok(None) => DevResponse::Next,
            Err(e) => {
                let message = e.to_string();
                error!(url, "{message}");
                self.sink.send(HmrPayload::Error {
                    message: message.clone(),
                });
                DevResponse::Error {
                    status: 500,
                    message,
                }
            }
        }
    }

    /// Invalidate the module behind a changed file and notify clients.
    pub fn handle_file_change(&self, change: &FileChange) -> Option<Invalidation> {
        self.hmr.on_change(change)
    }

    /// Transform `urls` and everything they transitively import.
    ///
    /// Returns the number of modules transformed. URLs that do not resolve
    /// are skipped.
    pub async fn warmup<I, S>(&self, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<String> = urls.into_iter().map(Into::into).collect();
        let mut seen = FxHashSet::default();
        let mut transformed = 0;

        while let Some(url) = queue.pop_front() {
            if !seen.insert(clean_url(&url).to_string()) {
                continue;
            }
            if self.transform_request(&url).await?.is_none() {
                debug!(url, "warmup skipped unresolved module");
                continue;
            }
            transformed += 1;

            let Some(module) = self.graph.get_by_url(&url).await? else {
                continue;
            };
            if let Some(node) = self.graph.module(module) {
                let mut next: Vec<String> = node
                    .imported_modules
                    .iter()
                    .filter_map(|m| self.graph.url(*m))
                    .collect();
                next.sort();
                queue.extend(next);
            }
        }

        Ok(transformed)
    }
}

impl std::fmt::Debug for DevServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevServer")
            .field("root", &self.config.root)
            .field("container", &self.container)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

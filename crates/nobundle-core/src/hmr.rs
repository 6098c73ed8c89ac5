//! Hot Module Replacement.
//!
//! Turns file-change events into graph invalidations and HMR messages for
//! the client runtime. The transport is abstracted behind [`HmrSink`].

use crate::graph::{Invalidation, ModuleGraph};
use crate::url::{normalize_path, short_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Message sent to connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrPayload {
    /// Sent once when a client connects.
    Connected,
    /// Modules to re-fetch.
    Update { updates: Vec<Update> },
    /// The page must reload.
    FullReload {
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// A transform failed.
    Error { message: String },
}

/// A single module update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Graph version of the invalidation.
    pub timestamp: u64,
    /// Public path of the changed module.
    pub path: String,
    /// Public path of the module that accepts the update.
    pub accepted_path: String,
}

/// Kind of module update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    /// Re-import a script module (stylesheets are served as scripts too).
    JsUpdate,
}

/// Transport for HMR messages.
pub trait HmrSink: Send + Sync {
    fn send(&self, payload: HmrPayload);
}

impl HmrSink for broadcast::Sender<HmrPayload> {
    fn send(&self, payload: HmrPayload) {
        // No subscribers simply means no client is connected yet.
        if broadcast::Sender::send(self, payload).is_err() {
            debug!("no HMR clients connected");
        }
    }
}

/// A file-change event from the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Invalidates the graph on file changes and notifies clients.
pub struct HmrController {
    graph: Arc<ModuleGraph>,
    root: PathBuf,
    sink: Arc<dyn HmrSink>,
}

impl HmrController {
    /// Create a new controller.
    pub fn new(graph: Arc<ModuleGraph>, root: PathBuf, sink: Arc<dyn HmrSink>) -> Self {
        Self { graph, root, sink }
    }

    /// Module id for a changed path, in the form the resolver produces.
    fn to_id(&self, path: &Path) -> String {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        normalize_path(&path.display().to_string())
    }

    /// Handle one file change.
    ///
    /// Invalidates the changed module and its importers, then sends one
    /// `js-update` for the changed module. A changed `.html` file with no
    /// module sends a full reload. Returns the invalidation report, or `None`
    /// when the file is not part of the graph.
    pub fn on_change(&self, change: &FileChange) -> Option<Invalidation> {
        let id = self.to_id(&change.path);
        let short = short_name(&id, &self.root);
        info!("[hmr] {short} changed");

        let Some(report) = self.graph.invalidate(&id) else {
            if Path::new(&id)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
            {
                self.sink.send(HmrPayload::FullReload { path: Some(short) });
            } else {
                debug!(id, "changed file is not in the module graph");
            }
            return None;
        };

        let url = report
            .modules
            .first()
            .and_then(|m| self.graph.url(*m))
            .unwrap_or(short);
        debug!(
            url,
            timestamp = report.timestamp,
            invalidated = report.modules.len(),
            "modules invalidated"
        );
        self.sink.send(HmrPayload::Update {
            updates: vec![Update {
                kind: UpdateKind::JsUpdate,
                timestamp: report.timestamp,
                path: url.clone(),
                accepted_path: url,
            }],
        });
        Some(report)
    }
}

//! File system resolution and loading.
//!
//! Resolves request paths (`/src/App`) against the project root and
//! relative specifiers (`./App`) against the importer's directory, trying
//! the configured extensions and `index.*` files. Bare specifiers are left to
//! other plugins: pre-bundling guarantees their output exists.

use crate::config::DevConfig;
use crate::error::Result;
use crate::plugin::{LoadHook, LoadResult, Plugin, PluginContext, ResolveHook, ResolvedId};
use crate::url::{clean_url, normalize_path};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Resolves and loads modules from disk.
pub struct FsPlugin {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsPlugin {
    /// Create a new fs plugin for the config's root and extensions.
    #[must_use]
    pub fn new(config: &DevConfig) -> Self {
        Self {
            root: config.root.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// Wrap into a pipeline plugin with resolve and load slots.
    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        let fs = Arc::new(self);
        Plugin::new("fs").with_resolve(Arc::clone(&fs)).with_load(fs)
    }

    /// Candidate path for a specifier before lookup, if it is fs-shaped.
    fn candidate(&self, specifier: &str, importer: Option<&str>) -> Option<PathBuf> {
        let specifier = clean_url(specifier);
        if specifier.starts_with('/') {
            let as_is = Path::new(specifier);
            if as_is.starts_with(&self.root) {
                return Some(as_is.to_path_buf());
            }
            return Some(self.root.join(specifier.trim_start_matches('/')));
        }
        if specifier.starts_with('.') {
            let base = importer
                .map(|i| Path::new(clean_url(i)))
                .and_then(Path::parent)
                .filter(|dir| dir.is_absolute())
                .map_or_else(|| self.root.clone(), Path::to_path_buf);
            return Some(base.join(specifier));
        }
        None
    }

    /// Find the file a candidate refers to: exact, with an extension, or as
    /// a directory index.
    async fn find_file(&self, candidate: &Path) -> Option<PathBuf> {
        if is_file(candidate).await {
            return Some(candidate.to_path_buf());
        }
        let base = candidate.display().to_string();
        for ext in &self.extensions {
            let with_ext = PathBuf::from(format!("{base}{ext}"));
            if is_file(&with_ext).await {
                return Some(with_ext);
            }
        }
        for ext in &self.extensions {
            let index = candidate.join(format!("index{ext}"));
            if is_file(&index).await {
                return Some(index);
            }
        }
        None
    }
}

#[async_trait]
impl ResolveHook for FsPlugin {
    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        _ctx: &PluginContext<'_>,
    ) -> Result<Option<ResolvedId>> {
        let Some(candidate) = self.candidate(specifier, importer) else {
            return Ok(None);
        };
        let candidate = normalize_components(&candidate);
        // `..` segments must not climb out of the project.
        if !candidate.starts_with(&self.root) {
            tracing::debug!(specifier, "resolves outside the project root; ignored");
            return Ok(None);
        }
        let found = self.find_file(&candidate).await;
        Ok(found.map(|path| ResolvedId::new(normalize_path(&path.display().to_string()))))
    }
}

#[async_trait]
impl LoadHook for FsPlugin {
    async fn load(&self, id: &str, _ctx: &PluginContext<'_>) -> Result<Option<LoadResult>> {
        let path = Path::new(clean_url(id));
        if id.starts_with('\0') || !path.is_absolute() || !is_file(path).await {
            return Ok(None);
        }
        let code = tokio::fs::read_to_string(path).await?;
        Ok(Some(LoadResult::code(code)))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Lexically resolve `.` and `..` components.
fn normalize_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

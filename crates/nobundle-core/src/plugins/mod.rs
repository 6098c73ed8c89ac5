//! Built-in plugins.
//!
//! [`default_plugins`] assembles the chain a dev server runs; the plugins are
//! also usable on their own.

mod alias;
mod client;
mod css;
mod fs;

pub(crate) use alias::alias_matches;
pub use alias::AliasPlugin;
pub use client::ClientPlugin;
pub use css::CssPlugin;
pub use fs::FsPlugin;

use crate::config::DevConfig;
use crate::error::{Error, Result};
use crate::plugin::{
    LoadHook, LoadResult, Plugin, PluginContext, ResolveHook, ResolvedId, TransformHook,
    TransformResult,
};
use crate::rewrite::ImportAnalysisPlugin;
use crate::url::{clean_url, is_asset_path, short_name};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Public prefix virtual modules are served under.
pub const VIRTUAL_PREFIX: &str = "/@virtual/";

/// The default plugin chain with `user` plugins inserted before import analysis.
#[must_use]
pub fn default_plugins(config: &Arc<DevConfig>, user: Vec<Plugin>) -> Vec<Plugin> {
    let mut plugins = vec![
        AliasPlugin::from_config(config).into_plugin(),
        ClientPlugin::new(config).into_plugin(),
        AssetPlugin::new(config).into_plugin(),
        CssPlugin.into_plugin(),
        FsPlugin::new(config).into_plugin(),
        JsonPlugin.into_plugin(),
    ];
    plugins.extend(user);
    plugins.push(ImportAnalysisPlugin::new(Arc::clone(config)).into_plugin());
    plugins
}

/// Serves imported assets as modules exporting their public URL.
pub struct AssetPlugin {
    root: PathBuf,
}

impl AssetPlugin {
    #[must_use]
    pub fn new(config: &DevConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        Plugin::new("asset").with_load(self)
    }
}

#[async_trait]
impl LoadHook for AssetPlugin {
    async fn load(&self, id: &str, _ctx: &PluginContext<'_>) -> Result<Option<LoadResult>> {
        if !is_asset_path(id) {
            return Ok(None);
        }
        let url = short_name(clean_url(id), &self.root);
        let literal = serde_json::to_string(&url).map_err(|e| Error::other(e.to_string()))?;
        Ok(Some(LoadResult::code(format!("export default {literal};"))))
    }
}

/// Plugin that handles JSON imports.
pub struct JsonPlugin;

impl JsonPlugin {
    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        Plugin::new("json").with_transform(self)
    }
}

#[async_trait]
impl TransformHook for JsonPlugin {
    async fn transform(
        &self,
        code: &str,
        id: &str,
        _ctx: &PluginContext<'_>,
    ) -> Result<Option<TransformResult>> {
        if !clean_url(id).ends_with(".json") {
            return Ok(None);
        }
        serde_json::from_str::<serde_json::Value>(code)
            .map_err(|e| Error::other(format!("invalid JSON in {id}: {e}")))?;
        Ok(Some(TransformResult::code(format!(
            "export default {};",
            code.trim()
        ))))
    }
}

/// Plugin that creates virtual modules.
///
/// Modules are addressed as `/@virtual/<name>`, which is both their
/// specifier and their id.
pub struct VirtualPlugin {
    modules: FxHashMap<String, String>,
}

impl VirtualPlugin {
    /// Create a new virtual plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: FxHashMap::default(),
        }
    }

    /// Add a virtual module.
    #[must_use]
    pub fn module(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.modules
            .insert(format!("{VIRTUAL_PREFIX}{}", name.into()), code.into());
        self
    }

    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        let plugin = Arc::new(self);
        Plugin::new("virtual")
            .with_resolve(Arc::clone(&plugin))
            .with_load(plugin)
    }
}

impl Default for VirtualPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolveHook for VirtualPlugin {
    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
        _ctx: &PluginContext<'_>,
    ) -> Result<Option<ResolvedId>> {
        let id = clean_url(specifier);
        Ok(self.modules.contains_key(id).then(|| ResolvedId::new(id)))
    }
}

#[async_trait]
impl LoadHook for VirtualPlugin {
    async fn load(&self, id: &str, _ctx: &PluginContext<'_>) -> Result<Option<LoadResult>> {
        Ok(self.modules.get(id).map(LoadResult::code))
    }
}

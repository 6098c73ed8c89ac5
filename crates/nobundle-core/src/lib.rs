#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_panics_doc)]

//! Core of the nobundle development server.
//!
//! Serves source modules on demand instead of a bundle. Every request runs
//! resolve → load → transform through an ordered plugin pipeline; the
//! import-analysis stage rewrites specifiers to browser-loadable URLs and
//! records the discovered edges in a live module graph, which file changes
//! invalidate so HMR never serves stale code.

pub mod config;
pub mod error;
pub mod graph;
pub mod hmr;
pub mod plugin;
pub mod plugins;
pub mod prebundle;
pub mod rewrite;
pub mod scan;
pub mod server;
pub mod transform;
pub mod url;

pub use config::DevConfig;
pub use error::{Error, PluginError, Result};
pub use graph::{
    GraphSnapshot, ImportTarget, Invalidation, ModuleGraph, ModuleHandle, ModuleNode,
    ModuleSnapshot, UrlResolver,
};
pub use hmr::{FileChange, HmrController, HmrPayload, HmrSink, Update, UpdateKind};
pub use plugin::{
    LoadHook, LoadResult, Plugin, PluginContainer, PluginContext, PluginEnforce, ResolveHook,
    ResolvedId, TransformHook, TransformResult,
};
pub use plugins::{
    default_plugins, AliasPlugin, AssetPlugin, ClientPlugin, CssPlugin, FsPlugin, JsonPlugin,
    VirtualPlugin,
};
pub use prebundle::{scan_bare_imports, PrebundleManifest};
pub use rewrite::{ImportAnalysisPlugin, RewriteOutput};
pub use scan::{scan_imports, ImportKind, ImportSpecifier};
pub use server::DevServer;
pub use transform::{transform_request, DevResponse};

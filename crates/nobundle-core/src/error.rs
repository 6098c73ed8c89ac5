//! Error types shared by the pipeline, the graph and the dev server.

use crate::graph::ModuleHandle;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type for nobundle operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Unknown module {0}")]
    UnknownModule(ModuleHandle),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Attribute this error to a plugin hook.
    ///
    /// Errors that already carry a plugin attribution (raised by a nested
    /// `ctx.resolve`) keep it.
    #[must_use]
    pub fn in_plugin(self, plugin: &str, hook: &'static str) -> Self {
        match self {
            Self::Plugin(_) => self,
            other => Self::Plugin(PluginError {
                plugin: plugin.to_string(),
                hook,
                message: other.to_string(),
            }),
        }
    }
}

/// Error raised by a plugin hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{plugin}] {hook}: {message}")]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Error message.
    pub message: String,
}

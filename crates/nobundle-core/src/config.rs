//! Dev server configuration: project root, extensions, aliases and the
//! pre-bundle directory, optionally read from `nobundle.config.json`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the optional project config at the root.
pub const CONFIG_FILE: &str = "nobundle.config.json";

/// Dev server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevConfig {
    /// Project root directory.
    #[serde(skip)]
    pub root: PathBuf,

    /// Directory (relative to root) holding pre-bundled packages.
    pub prebundle_dir: String,

    /// URL the HMR client runtime is served from.
    pub client_public_path: String,

    /// Modules whose id contains this fragment get no HMR bootstrap.
    pub no_instrument: String,

    /// Specifier prefix → replacement.
    pub alias: BTreeMap<String, String>,

    /// Extensions tried when resolving files, in order.
    pub extensions: Vec<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            prebundle_dir: "node_modules/.nobundle".to_string(),
            client_public_path: "/@nobundle/client".to_string(),
            no_instrument: "node_modules".to_string(),
            alias: BTreeMap::new(),
            extensions: [".tsx", ".ts", ".jsx", ".js", ".mjs"]
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
        }
    }
}

impl DevConfig {
    /// Create a default config rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load `nobundle.config.json` from `root`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let path = root.join(CONFIG_FILE);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<Self>(&text)
                .map_err(|source| Error::ConfigParse { path, source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => return Err(Error::ConfigRead { path, source }),
        };
        config.root = root;
        Ok(config)
    }

    /// Add an alias entry.
    #[must_use]
    pub fn with_alias(mut self, find: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.alias.insert(find.into(), replacement.into());
        self
    }

    /// Set the no-instrument fragment.
    #[must_use]
    pub fn with_no_instrument(mut self, fragment: impl Into<String>) -> Self {
        self.no_instrument = fragment.into();
        self
    }

    /// Public URL a pre-bundled package is served at.
    #[must_use]
    pub fn prebundle_url(&self, package: &str) -> String {
        format!("/{}/{package}.js", self.prebundle_dir.trim_matches('/'))
    }

    /// Absolute directory holding pre-bundled packages.
    #[must_use]
    pub fn prebundle_path(&self) -> PathBuf {
        self.root.join(self.prebundle_dir.trim_matches('/'))
    }

    /// Whether a configured alias applies to `specifier`.
    #[must_use]
    pub fn is_aliased(&self, specifier: &str) -> bool {
        self.alias
            .keys()
            .any(|from| crate::plugins::alias_matches(from, specifier))
    }

    /// Whether a module id must not receive the HMR bootstrap.
    #[must_use]
    pub fn is_no_instrument(&self, id: &str) -> bool {
        !self.no_instrument.is_empty() && id.contains(&self.no_instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DevConfig::new("/project");
        assert_eq!(config.prebundle_url("react"), "/node_modules/.nobundle/react.js");
        assert_eq!(
            config.prebundle_url("@scope/pkg"),
            "/node_modules/.nobundle/@scope/pkg.js"
        );
        assert!(config.is_no_instrument("/project/node_modules/x/index.js"));
        assert!(!config.is_no_instrument("/project/src/main.ts"));

        let config = config.with_alias("@/", "/src/");
        assert!(config.is_aliased("@/App"));
        assert!(!config.is_aliased("@scope/pkg"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DevConfig::load(dir.path()).unwrap();
        assert_eq!(config.client_public_path, "/@nobundle/client");
        assert_eq!(config.root, dunce::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "prebundleDir": "/deps/", "alias": { "@/": "/src/" } }"#,
        )
        .unwrap();
        let config = DevConfig::load(dir.path()).unwrap();
        assert_eq!(config.prebundle_url("vue"), "/deps/vue.js");
        assert_eq!(config.alias.get("@/").map(String::as_str), Some("/src/"));
        assert_eq!(config.no_instrument, "node_modules");
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ nope").unwrap();
        let err = DevConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}

//! `nobundle scan` command implementation.
//!
//! Lists the bare packages the given sources import and which of them have
//! no pre-bundled output yet.

use super::print_json;
use miette::{IntoDiagnostic, Result, WrapErr};
use nobundle_core::{scan_bare_imports, DevConfig, PrebundleManifest};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub fn run(root: &Path, files: &[PathBuf], json: bool) -> Result<()> {
    let config = DevConfig::load(root).into_diagnostic()?;

    let mut needed = BTreeSet::new();
    for file in files {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            config.root.join(file)
        };
        let source = std::fs::read_to_string(&path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        needed.extend(scan_bare_imports(&source));
    }

    let manifest = PrebundleManifest::read(&config.root, &config.prebundle_dir).into_diagnostic()?;
    let missing = manifest.missing(&needed);

    if json {
        return print_json(&json!({
            "prebundleDir": config.prebundle_dir,
            "imports": needed,
            "missing": missing,
        }));
    }

    for specifier in &needed {
        let status = if manifest.contains(specifier) { "ok" } else { "missing" };
        println!("{specifier:<40} {status} -> {}", config.prebundle_url(specifier));
    }
    if !missing.is_empty() {
        println!();
        println!("{} package(s) need pre-bundling", missing.len());
    }
    Ok(())
}

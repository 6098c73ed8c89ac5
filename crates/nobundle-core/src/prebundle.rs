//! Pre-bundle directory contract.
//!
//! Third-party packages are flattened into one file per bare specifier by an
//! external pre-bundler before the server accepts requests; the import
//! rewriter points bare specifiers straight at those files. This module
//! finds what a pre-bundler must produce and what it already has.

use crate::error::Result;
use crate::scan::scan_imports;
use crate::url::{is_bare_import, normalize_path};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scan source code for bare import specifiers.
///
/// Scheme specifiers (`node:fs`, `data:...`) are not packages and are skipped.
#[must_use]
pub fn scan_bare_imports(source: &str) -> BTreeSet<String> {
    scan_imports(source)
        .into_iter()
        .map(|found| found.specifier)
        .filter(|specifier| is_bare_import(specifier) && !specifier.contains(':'))
        .collect()
}

/// The specifiers present in a pre-bundle output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrebundleManifest {
    /// Output directory.
    pub dir: PathBuf,
    /// Specifiers with an output file (`react`, `@scope/pkg`, `react-dom/client`).
    pub entries: BTreeSet<String>,
}

impl PrebundleManifest {
    /// Read the output directory `dir` (relative to `root`).
    ///
    /// A missing directory yields an empty manifest.
    pub fn read(root: &Path, dir: &str) -> Result<Self> {
        let dir = root.join(dir.trim_matches('/'));
        let mut entries = BTreeSet::new();
        if !dir.is_dir() {
            return Ok(Self { dir, entries });
        }

        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("js")
            {
                continue;
            }
            if let Ok(rel) = path.with_extension("").strip_prefix(&dir) {
                entries.insert(normalize_path(&rel.display().to_string()));
            }
        }
        Ok(Self { dir, entries })
    }

    /// Check if a specifier has been pre-bundled.
    #[must_use]
    pub fn contains(&self, specifier: &str) -> bool {
        self.entries.contains(specifier)
    }

    /// Specifiers from `needed` with no output file yet.
    #[must_use]
    pub fn missing<'a>(&self, needed: &'a BTreeSet<String>) -> Vec<&'a str> {
        needed
            .iter()
            .filter(|s| !self.contains(s))
            .map(String::as_str)
            .collect()
    }
}

//! Every source module carries a `//!` header.

use std::path::Path;
use walkdir::WalkDir;

#[test]
fn test_every_module_has_a_doc_header() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut missing = Vec::new();

    for entry in WalkDir::new(&src) {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let source = std::fs::read_to_string(path).unwrap();
        if !source.lines().any(|line| line.starts_with("//!")) {
            missing.push(path.strip_prefix(&src).unwrap().display().to_string());
        }
    }

    assert!(missing.is_empty(), "modules without a `//!` header: {missing:?}");
}

#[test]
fn test_documented_config_and_plugins() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for rel in ["config.rs", "plugins/alias.rs", "plugins/css.rs"] {
        let source = std::fs::read_to_string(src.join(rel)).unwrap();
        assert!(source.starts_with("//! "), "{rel} should open with a module doc");
    }
}

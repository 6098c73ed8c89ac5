//! Integration tests for `nobundle --json` output.
//!
//! These tests lay out a small project and verify:
//! - `transform` prints the rewritten module, or `ok: false` on a miss
//! - `graph` prints every crawled module with its edges
//! - `scan` lists bare packages and which ones lack pre-bundled output

use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

fn nobundle() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nobundle"))
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn create_project() -> TempDir {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "src/main.ts",
        "import App from './App';\nimport React from 'react';\nimport { createRoot } from 'react-dom/client';\n",
    );
    write(dir.path(), "src/App.ts", "export default function App() {}\n");
    write(dir.path(), "node_modules/.nobundle/react.js", "export default {};\n");
    dir
}

fn run_json(dir: &TempDir, args: &[&str]) -> (bool, serde_json::Value) {
    let output = nobundle()
        .arg("--json")
        .arg("--root")
        .arg(dir.path())
        .args(args)
        .output()
        .expect("Failed to run nobundle");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");
    (output.status.success(), json)
}

#[test]
fn test_transform_json() {
    let dir = create_project();
    let (success, json) = run_json(&dir, &["transform", "/src/main.ts"]);

    assert!(success);
    assert_eq!(json["ok"], true);
    assert_eq!(json["contentType"], "application/javascript");
    let code = json["code"].as_str().unwrap();
    assert!(code.contains("from '/src/App.ts'"));
    assert!(code.contains("from '/node_modules/.nobundle/react.js'"));
    assert!(code.contains("from '/node_modules/.nobundle/react-dom/client.js'"));
    assert!(code.contains("import.meta.hot"));
}

#[test]
fn test_transform_miss_json() {
    let dir = create_project();
    let (success, json) = run_json(&dir, &["transform", "/src/nope.ts"]);

    assert!(!success);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains("/src/nope.ts"));
}

#[test]
fn test_graph_json() {
    let dir = create_project();
    let (success, json) = run_json(&dir, &["graph", "/src/main.ts"]);

    assert!(success);
    assert_eq!(json["version"], 0);
    let modules = json["modules"].as_array().unwrap();
    let main = modules
        .iter()
        .find(|m| m["url"] == "/src/main.ts")
        .expect("main module in graph");
    let imports: Vec<&str> = main["importedModules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(
        imports,
        vec![
            "/node_modules/.nobundle/react-dom/client.js",
            "/node_modules/.nobundle/react.js",
            "/src/App.ts",
        ]
    );

    let app = modules.iter().find(|m| m["url"] == "/src/App.ts").unwrap();
    assert_eq!(app["importers"][0], "/src/main.ts");
    assert_eq!(app["cached"], true);
}

#[test]
fn test_scan_json() {
    let dir = create_project();
    let (success, json) = run_json(&dir, &["scan", "src/main.ts"]);

    assert!(success);
    assert_eq!(json["prebundleDir"], "node_modules/.nobundle");
    assert_eq!(json["imports"], serde_json::json!(["react", "react-dom/client"]));
    assert_eq!(json["missing"], serde_json::json!(["react-dom/client"]));
}

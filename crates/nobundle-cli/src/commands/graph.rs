//! `nobundle graph` command implementation.

use super::{open_server, print_json};
use miette::{IntoDiagnostic, Result};
use std::path::Path;

pub fn run(root: &Path, urls: Vec<String>, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let (server, _rx) = open_server(root)?;
    let transformed = runtime
        .block_on(server.warmup(urls))
        .into_diagnostic()?;
    tracing::debug!(transformed, "crawl finished");

    let snapshot = server.graph().snapshot();
    if json {
        return print_json(&snapshot);
    }

    for module in &snapshot.modules {
        let state = if module.cached { "cached" } else { "stale" };
        println!("{} ({state}, v{})", module.url, module.last_invalidated_at);
        for import in &module.imported_modules {
            println!("  -> {import}");
        }
    }
    println!();
    println!("{} modules, graph version {}", snapshot.modules.len(), snapshot.version);
    Ok(())
}

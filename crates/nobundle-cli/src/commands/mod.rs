pub mod graph;
pub mod scan;
pub mod transform;
pub mod watch;

use miette::{IntoDiagnostic, Result};
use nobundle_core::{DevConfig, DevServer, HmrPayload, HmrSink};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Load the project config at `root` and build a server with the default
/// plugin chain. HMR messages go to the returned channel.
pub fn open_server(root: &Path) -> Result<(DevServer, broadcast::Receiver<HmrPayload>)> {
    let config = DevConfig::load(root).into_diagnostic()?;
    let (tx, rx) = broadcast::channel(64);
    let sink: Arc<dyn HmrSink> = Arc::new(tx);
    Ok((DevServer::new(config, Vec::new(), sink), rx))
}

/// Print a JSON value to stdout.
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

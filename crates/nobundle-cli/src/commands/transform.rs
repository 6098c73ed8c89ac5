//! `nobundle transform` command implementation.
//!
//! Runs one request through the dev middleware and prints what the browser
//! would receive.

use super::{open_server, print_json};
use miette::{miette, IntoDiagnostic, Result};
use nobundle_core::DevResponse;
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, url: &str, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let (server, _rx) = open_server(root)?;
    let response = runtime.block_on(server.handle_request("GET", url));

    let error = match response {
        DevResponse::Ok { body, content_type } => {
            if json {
                print_json(&json!({
                    "ok": true,
                    "url": url,
                    "contentType": content_type,
                    "code": body,
                }))?;
            } else {
                print!("{body}");
            }
            return Ok(());
        }
        DevResponse::Next => format!("{url} is not served by the module pipeline"),
        DevResponse::Error { message, .. } => message,
    };

    if json {
        print_json(&json!({ "ok": false, "url": url, "error": error }))?;
        std::process::exit(1);
    }
    Err(miette!(error))
}

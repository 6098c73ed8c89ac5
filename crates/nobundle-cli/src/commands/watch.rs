//! `nobundle watch` command implementation.
//!
//! Crawls the entry URLs, then watches the project root and feeds every
//! change to the invalidation controller. Each HMR message a browser would
//! receive is printed to stdout as one JSON line.

use super::open_server;
use miette::{IntoDiagnostic, Result};
use nobundle_core::{DevServer, FileChange, HmrPayload};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// Changes closer together than this are reported in one batch.
const DEBOUNCE: Duration = Duration::from_millis(50);

pub fn run(root: &Path, urls: Vec<String>, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let (server, rx) = open_server(root)?;
    runtime.block_on(watch(server, rx, urls, json))
}

async fn watch(
    server: DevServer,
    mut payloads: broadcast::Receiver<HmrPayload>,
    urls: Vec<String>,
    json: bool,
) -> Result<()> {
    let transformed = server.warmup(urls.clone()).await.into_diagnostic()?;
    info!(transformed, "watching {}", server.config().root.display());

    let (change_tx, mut change_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    let watch_root = server.config().root.clone();
    std::thread::spawn(move || {
        if let Err(e) = watch_files(&watch_root, change_tx) {
            error!("file watcher error: {e}");
        }
    });

    loop {
        tokio::select! {
            Some(changed) = change_rx.recv() => {
                for path in changed {
                    server.handle_file_change(&FileChange::new(path));
                }
                // Re-crawl so edges of re-transformed modules are current
                // before the next change arrives.
                if let Err(e) = server.warmup(urls.clone()).await {
                    warn!("re-crawl failed: {e}");
                }
            }
            received = payloads.recv() => match received {
                Ok(payload) => print_payload(&payload, json)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "HMR messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
            else => break,
        }
    }
    Ok(())
}

fn print_payload(payload: &HmrPayload, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(payload).into_diagnostic()?);
        return Ok(());
    }
    match payload {
        HmrPayload::Update { updates } => {
            for update in updates {
                println!("update {} (t={})", update.path, update.timestamp);
            }
        }
        HmrPayload::FullReload { path } => {
            println!("full reload {}", path.as_deref().unwrap_or("*"));
        }
        HmrPayload::Error { message } => println!("error {message}"),
        HmrPayload::Connected => {}
    }
    Ok(())
}

/// Paths the watcher never reports.
fn should_ignore(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules" | ".git" | "target" | "dist")
        )
    })
}

/// Collects changed paths into debounced batches.
///
/// The first change after a quiet period is flushed at once; changes that
/// follow within [`DEBOUNCE`] are held until the stream goes quiet.
#[derive(Default)]
struct ChangeBatch {
    pending: HashSet<PathBuf>,
    last_flush: Option<Instant>,
}

impl ChangeBatch {
    /// Record changed paths, returning a batch if one is due now.
    fn add(
        &mut self,
        paths: impl IntoIterator<Item = PathBuf>,
        now: Instant,
    ) -> Option<Vec<PathBuf>> {
        self.pending
            .extend(paths.into_iter().filter(|p| !should_ignore(p)));
        if self
            .last_flush
            .is_some_and(|last| now.duration_since(last) < DEBOUNCE)
        {
            return None;
        }
        self.flush(now)
    }

    /// Take everything still pending.
    fn flush(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_flush = Some(now);
        let mut batch: Vec<PathBuf> = self.pending.drain().collect();
        batch.sort();
        Some(batch)
    }
}

/// Watch `root` recursively and send debounced batches of changed files.
fn watch_files(root: &Path, change_tx: mpsc::Sender<Vec<PathBuf>>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, notify::Config::default()).into_diagnostic()?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .into_diagnostic()?;

    let mut batch = ChangeBatch::default();

    loop {
        let ready = match rx.recv_timeout(DEBOUNCE) {
            Ok(Ok(event)) => {
                if !event.kind.is_modify() && !event.kind.is_create() {
                    continue;
                }
                batch.add(event.paths, Instant::now())
            }
            Ok(Err(e)) => {
                warn!("watch error: {e}");
                continue;
            }
            // Quiet period: release the tail of a burst.
            Err(RecvTimeoutError::Timeout) => batch.flush(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if let Some(changed) = ready {
            if change_tx.blocking_send(changed).is_err() {
                break;
            }
        }
    }

    Ok(())
}

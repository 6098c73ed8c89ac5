#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nobundle")]
#[command(author, version, about = "Inspect the nobundle dev server pipeline", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Project root (defaults to the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve one module URL through the pipeline and print the result
    Transform {
        /// Request URL, e.g. /src/main.ts
        url: String,
    },

    /// Crawl from entry URLs and print the module graph
    Graph {
        /// Entry URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Crawl from entry URLs, then print HMR messages as files change
    Watch {
        /// Entry URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List the bare packages a pre-bundler must produce for the given files
    Scan {
        /// Source files to scan
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = cli
        .root
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Transform { url } => commands::transform::run(&root, &url, cli.json),
        Commands::Graph { urls } => commands::graph::run(&root, urls, cli.json),
        Commands::Watch { urls } => commands::watch::run(&root, urls, cli.json),
        Commands::Scan { files } => commands::scan::run(&root, &files, cli.json),
    }
}

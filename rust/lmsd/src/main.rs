mod assignments;
mod auth;
mod certificates;
mod commissions;
mod config;
mod currency;
mod curriculum;
mod db;
mod error;
mod ipc;
mod logging;
mod orders;
mod progress;
mod ratings;
mod refunds;
mod settings;
mod wallet;

use clap::Parser;
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// LMS back-office daemon speaking JSON lines over stdin/stdout.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace directory to open on startup
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Write logs to a daily rotating file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log filter directive, e.g. `lmsd=debug` (falls back to LMSD_LOG)
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_log(cli.log_dir, cli.log_filter)?;

    let mut state = ipc::AppState::new();
    if let Some(path) = cli.workspace {
        ipc::select_workspace(&mut state, &path)?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lmsd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "bad request line");
                json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}

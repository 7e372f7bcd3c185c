use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "LMSD_LOG";

/// Initialise logging. Stdout carries protocol responses, so logs go to
/// stderr unless a log directory is given, in which case they rotate daily.
pub fn init_log(
    log_dir: Option<PathBuf>,
    filter: Option<String>,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match filter {
        Some(directive) => EnvFilter::try_new(directive).context("invalid log filter")?,
        None => EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);
    let (non_blocking, guard) = if let Some(dir) = log_dir {
        if !dir.is_dir() {
            bail!("log path is not a directory: {}", dir.to_string_lossy());
        }
        let file_appender = tracing_appender::rolling::daily(dir, "lmsd.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };
    tracing::subscriber::set_global_default(subscriber_builder.with_writer(non_blocking).finish())
        .context("init log failed")?;
    Ok(guard)
}

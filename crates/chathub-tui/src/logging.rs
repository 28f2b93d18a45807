use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chathub_core::Config;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CHATHUB_LOG";

/// Install the global subscriber.
///
/// The TUI owns the terminal, so by default events go to a log file in the
/// config directory. `to_stderr` is for the one-shot commands.
pub fn init(to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(filter);

    if to_stderr {
        return builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!(e));
    }

    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    builder
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow!(e))
}

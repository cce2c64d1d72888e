//! Tracing subscriber setup for the binaries.
//!
//! Reads the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,soft_q_cartpole=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Initialize console logging to stderr. A second call is a no-op.
pub fn init_console_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

/// Initialize logging to a file (used while the TUI owns the terminal).
pub fn init_file_logging(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();
    Ok(())
}

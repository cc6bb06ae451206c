//! Diagnostic logging setup.
//!
//! Logs go to stderr so that streamed text on stdout stays clean. `AI_WRITER_LOG` (or
//! `RUST_LOG`) takes precedence over the verbosity flags.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "AI_WRITER_LOG";

/// Filter directive for a given number of `-v` flags.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

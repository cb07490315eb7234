//! Diagnostic logging setup.
//!
//! Logs go to stderr so command output on stdout stays clean. The level
//! comes from `GIFBOT_LOG`, then `RUST_LOG`, then the `--verbose` flag.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GIFBOT_LOG";

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(verbose);

    let _ = tracing_subscriber::registry()
        .with(build_env_filter(verbose))
        .with(fmt_layer)
        .try_init();
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    for var in [LOG_ENV, "RUST_LOG"] {
        if let Ok(directives) = std::env::var(var) {
            if let Ok(filter) = EnvFilter::try_new(&directives) {
                return filter;
            }
        }
    }
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

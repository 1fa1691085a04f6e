//! Tracing subscriber setup for the docket binary.
//!
//! Logs go to stderr so command output on stdout stays scriptable.
//!
//! Filter priority (highest first):
//! 1. `DOCKET_LOG` (directives, e.g. `docket=debug,warn`)
//! 2. `RUST_LOG`
//! 3. `--verbose` (debug)
//! 4. `info` for the daemon, `warn` otherwise

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Project-specific filter variable.
pub const ENV_LOG: &str = "DOCKET_LOG";

/// Install the global subscriber. Call once, before any command runs.
pub fn init(verbose: bool, long_running: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(false)
        .compact();

    // A subscriber installed earlier (e.g. by a test harness) wins.
    let _ = tracing_subscriber::registry()
        .with(build_filter(verbose, long_running))
        .with(fmt_layer)
        .try_init();
}

fn build_filter(verbose: bool, long_running: bool) -> EnvFilter {
    for var in [ENV_LOG, "RUST_LOG"] {
        if let Ok(directives) = std::env::var(var)
            && let Ok(filter) = EnvFilter::try_new(&directives)
        {
            return filter;
        }
    }
    EnvFilter::new(default_directive(verbose, long_running))
}

fn default_directive(verbose: bool, long_running: bool) -> &'static str {
    match (verbose, long_running) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    }
}

//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Level name for a `verbosity` setting (0 = error .. 4 = trace).
#[must_use]
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Install the global fmt subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity))),
        )
        .try_init();
}

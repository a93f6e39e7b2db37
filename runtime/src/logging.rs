//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, else `level` for everything.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for `--json` output and `prompt`.
pub fn init(level: &str, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be set (tests, embedding); keep that one.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

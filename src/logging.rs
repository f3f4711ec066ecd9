use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "dbstage=info";

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins when set (e.g. `RUST_LOG=dbstage=debug`), otherwise
/// dbstage logs at info. Output goes to stderr so `--json` stays parseable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (e.g. from a test harness) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

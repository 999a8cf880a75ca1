use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "gunsmith_advisor=info";

/// Installs the global subscriber. `RUST_LOG` wins over `fallback`.
///
/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber, honouring `RUST_LOG` and falling back to `default_filter`.
///
/// Logs go to stderr so stdout only carries conversation text.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

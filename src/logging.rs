use tracing_subscriber::EnvFilter;

/// Initialise logging for the host binary.
///
/// Without `verbose` the level is pinned to `info`. With it, `RUST_LOG` may
/// override the default `debug` level.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

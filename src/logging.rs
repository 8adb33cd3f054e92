use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
/// `RUST_LOG` wins over the `verbose` flag when set.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "kworb_streams=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .init();
}

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber for the binary.
///
/// `QB_LOG` takes an `EnvFilter` directive (e.g. `qb=trace`); without it the
/// level is `warn`, or `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var("QB_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

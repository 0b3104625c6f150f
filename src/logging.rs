use tracing_subscriber::filter::EnvFilter;

/// Initialize the tracing subscriber for a CLI invocation.
///
/// Logs go to stderr so reports on stdout stay machine-parseable. `--verbose`
/// lowers the default level to debug; `RUST_LOG` always wins.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init so integration tests can call through repeatedly.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

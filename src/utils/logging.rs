use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CALSYNC_LOG";

/// Install the global subscriber. `CALSYNC_LOG` takes precedence over `-v`.
pub fn init(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

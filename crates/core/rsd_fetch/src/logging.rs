use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Initialize a `tracing_subscriber` writing to stderr
///
/// If `debug` is `false` then only `error!`, `warn!` and `info!` are reported.
/// If `debug` is `true` then `debug!` and `trace!` are reported too.
/// `RUST_LOG` takes precedence over both.
pub fn initialise_tracing_subscriber(debug: bool) {
    let log_level = default_log_level(debug);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::rfc_3339())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();
}

fn default_log_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

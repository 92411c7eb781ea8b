use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.  `log` records from the library crates are
/// forwarded to it.
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level from `info`.
pub fn init(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";
const VERBOSE_FILTER: &str = "debug";

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }))
}

/// Installs the global subscriber: plain text on stderr.
///
/// `RUST_LOG` wins over `verbose` when set. Calling this twice is harmless;
/// the second subscriber is discarded.
pub fn init(verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time();
    let _ = tracing_subscriber::registry().with(filter(verbose)).with(layer).try_init();
}

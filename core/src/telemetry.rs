// Tracing subscriber setup shared by host binaries
use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,rmf_core=info,rmf_speech=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (falling back to `default_filter`).
/// Safe to call more than once; only the first call installs.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

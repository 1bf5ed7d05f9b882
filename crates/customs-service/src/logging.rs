//! Tracing subscriber setup for the binaries.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - show rejected requests and refresh ticks
//! - `RUST_LOG=customs_service=trace` - trace this crate only
//! - Default: the filter passed by the caller

use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber, keeping stdout free for JSON output.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

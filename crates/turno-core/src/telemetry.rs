use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging.
///
/// - Debug builds: human-readable output with targets
/// - Release builds: JSON output for log aggregation
///
/// The log level is controlled by `RUST_LOG`, defaulting to `info`.
/// Profile events (queue pass sizes, request URIs, sweep counts) are
/// emitted at debug level under the `turno::profile` target, so
/// `RUST_LOG=turno::profile=debug` enables them on their own.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if cfg!(debug_assertions) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    }
}

/// Log target for the profiling events gated by
/// [`AppContext::profiling`](crate::context::AppContext).
pub const PROFILE_TARGET: &str = "turno::profile";

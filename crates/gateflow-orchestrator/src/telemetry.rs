use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing once for the process. Respects `RUST_LOG`; defaults
/// to `info` for gateflow crates.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gateflow=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Route tracing output through the test harness.
///
/// Honors `RUST_LOG`, defaulting to `debug` for the registry crates. Safe to
/// call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("modreg_core=debug,modreg_catalog=debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init();
}

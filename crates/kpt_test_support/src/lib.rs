//! Initializes a tracing subscriber that writes to the test harness's
//! captured output, so `cargo test -- --nocapture` (or a failing test)
//! shows `tracing` events instead of swallowing them.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a global subscriber writing to the test writer, filtered by
/// `RUST_LOG` (defaulting to `debug`). Safe to call from every test; only
/// the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init()
            .ok();
    });
}

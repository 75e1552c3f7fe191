/*!
 * Logging addon — installs a `tracing` subscriber for the transport's
 * structured events.
 *
 * The core crate only emits events. Whether and how they are printed is
 * up to the application, so libraries embedding courier with their own
 * subscriber simply skip `install()`.
 */
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

/// Makes `install()` idempotent.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/**
 * Installs a formatted `tracing` subscriber filtered by `RUST_LOG`
 * (default `info`).
 *
 * Idempotent; subsequent calls are silent no-ops. If the application
 * already set a global subscriber, that one is kept.
 *
 * # Returns
 * `true` if this call installed the subscriber.
 */
pub fn install() -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

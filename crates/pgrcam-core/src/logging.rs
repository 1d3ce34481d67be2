//! Logging setup for hosts that load the library.
//!
//! The host process owns stdout/stderr, so nothing is installed until a
//! host asks for it. Initialisation is idempotent: a second call, or a host
//! that already installed a global subscriber, is a no-op.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize tracing with defaults (`RUST_LOG`, falling back to `info`).
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
pub fn init_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(version = env!("CARGO_PKG_VERSION"), "pgrcam logging enabled");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_with_filter("warn");
        init();
    }
}

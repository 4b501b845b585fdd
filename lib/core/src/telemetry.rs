//! Tracing subscriber bootstrap.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_filter` when `RUST_LOG` is unset or invalid.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_ignored() {
        init_tracing("debug");
        init_tracing("info");
        tracing::info!(target: "sigflow_core", "tracing initialized twice");
    }
}

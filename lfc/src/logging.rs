//! Tracing subscriber setup, following the same `EnvFilter` + `fmt` shape
//! used throughout the rest of the tree.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global tracing subscriber reading `RUST_LOG` (defaulting to
/// `info`). Call once from `main`; harmless to skip in tests, which install
/// their own `tracing_subscriber::fmt().with_test_writer()` as needed.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

//! Development-time tracing, separate from the user-facing view log.
//!
//! The colored log pane (and the text-mode stdout writer) is product output
//! driven through [`crate::view::RoutineView`]. Tracing here is dev
//! diagnostics only: `RUST_LOG`-filtered, written to stderr, not persisted.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber. Defaults to `warn` if `RUST_LOG` is unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

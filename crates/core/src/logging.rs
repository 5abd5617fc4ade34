//! Structured logging initialization.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init() -> anyhow::Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_line_number(true)
        .with_file(true);

    let error_layer = tracing_error::ErrorLayer::default();

    tracing_subscriber::registry()
        .with(filter)
        .with(error_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}

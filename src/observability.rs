//! Observability utilities.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::config::LogLevel;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
}

/// Initialize tracing subscriber once for the process.
///
/// `RUST_LOG` wins when set; otherwise `level` applies. Configuration is
/// usually loaded after tracing is up, so the level can be replaced later
/// with [`set_log_level`].
pub fn init_tracing(level: LogLevel) {
    FILTER_HANDLE.get_or_init(|| {
        let (filter, handle) = reload::Layer::new(filter_for(level));
        let result = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init();

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
        handle
    });
}

/// Swap the active filter for `level`. No-op before [`init_tracing`].
pub fn set_log_level(level: LogLevel) {
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(err) = handle.reload(filter_for(level)) {
            eprintln!("log level change skipped: {err}");
        }
    }
}

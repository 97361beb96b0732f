//! Structured logging for the Ridgeline terrain core.
//!
//! Console output with uptime timestamps, module targets, and thread names
//! (generation workers are named), filterable per module via `RUST_LOG` or
//! a config-supplied filter string.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// The filter used when neither `RUST_LOG` nor the config supplies one.
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber.
///
/// Filter precedence: the `RUST_LOG` environment variable, then a non-empty
/// `config_filter` (from the debug section of the terrain config), then
/// `info`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging(config_filter: Option<&str>) {
    let fallback = match config_filter {
        Some(filter) if !filter.is_empty() => filter.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

/// An `EnvFilter` with the default filter string, for tests and tools that
/// want consistent default behavior without installing a subscriber.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_string() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_module_filter_parses() {
        let filter = EnvFilter::new("info,ridgeline_stream=trace");
        let text = format!("{filter}");
        assert!(text.contains("ridgeline_stream=trace"));
    }
}

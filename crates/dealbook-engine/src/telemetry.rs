//! Tracing subscriber setup for binaries and services embedding the core.

use dealbook_types::constants::{ENGINE_NAME, VERSION};
use dealbook_types::{DealbookError, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. With `json` set, events are
/// written as one JSON object per line.
///
/// # Errors
/// Returns `Configuration` for an unparsable filter or if a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| DealbookError::Configuration(format!("log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    installed.map_err(|e| DealbookError::Configuration(format!("tracing init: {e}")))?;

    tracing::info!(engine = ENGINE_NAME, version = VERSION, json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        let _ = init_tracing("info", false);
        let err = init_tracing("info", true).unwrap_err();
        assert!(matches!(err, DealbookError::Configuration(_)));
    }
}

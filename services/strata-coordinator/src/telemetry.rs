//! Log subscriber setup for the coordinator binary

use strata_core::{CoreError, CoreResult};
use tracing_subscriber::EnvFilter;

/// Initialize the global fmt subscriber
///
/// `RUST_LOG` wins over `default_directive` when set.
///
/// # Errors
///
/// Returns `Internal` if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> CoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| CoreError::internal(format!("failed to initialize logging: {}", e)))?;

    tracing::info!("Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_logging("debug");
        let second = init_logging("debug");

        assert!(matches!(second, Err(CoreError::Internal { .. })));
    }
}

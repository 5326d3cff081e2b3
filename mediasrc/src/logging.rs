//! Logging initialization

use crate::error::{PlayerError, PlayerResult};
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber
///
/// `RUST_LOG` wins over `default_filter` when it is set. Calling this a
/// second time returns [`PlayerError::Logging`] and leaves the first
/// subscriber in place.
pub fn init_logging(default_filter: &str) -> PlayerResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| PlayerError::Logging {
            message: format!("invalid filter {:?}: {}", default_filter, e),
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| PlayerError::Logging {
            message: e.to_string(),
        })
}

//! Player-level errors

use mediasrc_core::MediaError;
use thiserror::Error;

/// Errors raised while setting up a player session
///
/// Failures inside a running session never show up here; the adapter
/// absorbs them at its callback boundaries and they end up in the
/// [`PlaybackReport`](crate::PlaybackReport) instead.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Configuration values are unusable
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read configuration {path}: {source}")]
    ConfigIo {
        /// Path of the configuration file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for [`PlayerConfig`](crate::PlayerConfig)
    #[error("Failed to parse configuration: {source}")]
    ConfigParse {
        /// Underlying parse error
        #[from]
        source: serde_json::Error,
    },

    /// Building the stream source failed
    #[error(transparent)]
    Media {
        /// Underlying media error
        #[from]
        source: MediaError,
    },

    /// A global subscriber was already installed or the filter is invalid
    #[error("Failed to initialize logging: {message}")]
    Logging {
        /// Error message
        message: String,
    },
}

/// Result type alias for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

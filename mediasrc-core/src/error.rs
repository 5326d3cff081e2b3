//! Media source error types and handling
//!
//! This module defines the error types used throughout the stream source
//! adapter and its producers. The three boundary classes
//! ([`MediaError::ResourceOpenFailure`], [`MediaError::SampleFillFailure`],
//! [`MediaError::SinkMediaFailure`]) are what the adapter logs at its
//! callback boundaries; the rest describe what actually went wrong inside a
//! producer or container.

use thiserror::Error;

/// Main error type for media source operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Container data could not be parsed
    #[error("Invalid container: {reason}")]
    InvalidContainer {
        /// Parse failure reason
        reason: String,
    },

    /// Unsupported format error
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// Format description
        format: String,
    },

    /// Invalid state for operation
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },

    /// Resource not available
    #[error("Resource not available: {resource}")]
    ResourceNotAvailable {
        /// Resource name
        resource: String,
    },

    /// A deferred request was dropped before it was completed
    #[error("Deferred sample request dropped before completion")]
    DeferralDropped,

    /// A producer panicked inside a callback
    #[error("Producer panicked: {message}")]
    ProducerPanicked {
        /// Panic payload, if it was a string
        message: String,
    },

    /// The backing resource could not be opened when the session started
    #[error("Failed to open {resource}: {source}")]
    ResourceOpenFailure {
        /// Resource that failed to open (path or producer name)
        resource: String,
        /// Underlying failure
        #[source]
        source: Box<MediaError>,
    },

    /// The producer failed while filling a sample request
    #[error("Sample fill failed in {producer}: {source}")]
    SampleFillFailure {
        /// Producer that failed
        producer: String,
        /// Underlying failure
        #[source]
        source: Box<MediaError>,
    },

    /// The rendering sink reported a media failure
    #[error("Sink media failure: {message}")]
    SinkMediaFailure {
        /// Message reported by the sink
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Wrap an error raised while opening a session resource
    pub fn open_failure(resource: impl Into<String>, source: MediaError) -> Self {
        MediaError::ResourceOpenFailure {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised by a producer during fill
    pub fn fill_failure(producer: impl Into<String>, source: MediaError) -> Self {
        MediaError::SampleFillFailure {
            producer: producer.into(),
            source: Box::new(source),
        }
    }

    /// Check if error is recoverable
    ///
    /// Wrapped boundary errors inherit the classification of their source.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::Io { source } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            MediaError::ResourceNotAvailable { .. } => true,
            MediaError::DeferralDropped => true,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::InvalidContainer { .. } => false,
            MediaError::UnsupportedFormat { .. } => false,
            MediaError::InvalidState { .. } => false,
            MediaError::ProducerPanicked { .. } => false,
            MediaError::ResourceOpenFailure { source, .. } => source.is_recoverable(),
            MediaError::SampleFillFailure { source, .. } => source.is_recoverable(),
            MediaError::SinkMediaFailure { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::Io { .. } => ErrorCategory::System,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::InvalidContainer { .. } => ErrorCategory::Format,
            MediaError::UnsupportedFormat { .. } => ErrorCategory::Format,
            MediaError::InvalidState { .. } => ErrorCategory::State,
            MediaError::ResourceNotAvailable { .. } => ErrorCategory::System,
            MediaError::DeferralDropped => ErrorCategory::State,
            MediaError::ProducerPanicked { .. } => ErrorCategory::Producer,
            MediaError::ResourceOpenFailure { .. } => ErrorCategory::ResourceOpen,
            MediaError::SampleFillFailure { .. } => ErrorCategory::SampleFill,
            MediaError::SinkMediaFailure { .. } => ErrorCategory::Sink,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O, unavailable resources)
    System,
    /// Configuration and parameter errors
    Configuration,
    /// Container and format errors
    Format,
    /// State management errors
    State,
    /// Producer misbehaviour
    Producer,
    /// Backing resource failed to open at session start
    ResourceOpen,
    /// Producer failed while filling a request
    SampleFill,
    /// Failure reported by the rendering sink
    Sink,
}

/// Helper trait for converting panic payloads caught at a callback boundary
pub trait IntoMediaError {
    /// Convert into a [`MediaError`] with some context
    fn into_media_error(self, context: &str) -> MediaError;
}

impl IntoMediaError for Box<dyn std::any::Any + Send> {
    fn into_media_error(self, context: &str) -> MediaError {
        let payload = if let Some(s) = self.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = self.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        MediaError::ProducerPanicked {
            message: format!("{}: {}", context, payload),
        }
    }
}

//! # mediasrc core
//!
//! Data model and state machine for a custom media stream source: stream
//! descriptors, sample requests with deferral, the producer capability, and
//! the adapter that bridges a pull-based rendering sink to a producer.

#![warn(clippy::all)]

pub mod adapter;
pub mod descriptor;
pub mod error;
pub mod producer;
pub mod request;
pub mod source;
pub mod time;

// Re-export main types
pub use adapter::{AdapterConfig, AdapterStats, SessionState, StreamSourceAdapter};
pub use descriptor::{
    AudioEncoding, DescriptorId, StreamDescriptor, StreamEncoding, VideoEncoding, VideoSubtype,
};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use producer::{Producer, ProducerFactory};
pub use request::{
    MediaSample, PendingSample, RequestCompletion, RequestStatus, SampleDeferral, SampleOutcome,
    SampleRequest, StartingRequest,
};
pub use source::{SourceCallbacks, StreamSource};
pub use time::{FrameRate, MediaTime};

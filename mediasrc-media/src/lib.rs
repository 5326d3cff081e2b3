//! # mediasrc media
//!
//! Producers and media plumbing for the stream source adapter: the
//! roving-square generator, the MP4 container reader and file-backed
//! producer, descriptor configuration, and the camera preview that runs
//! alongside playback.

#![warn(clippy::all)]

pub mod capture;
pub mod configure;
pub mod factory;
pub mod file_producer;
pub mod mp4;
pub mod synthetic;

// Re-export main types
pub use capture::{
    CaptureBackend, CaptureDevice, CaptureError, CaptureEvent, CapturePreview, CaptureResult,
    MockCaptureBackend, PreviewState,
};
pub use configure::{configure, DescriptorKind, SourceParameters};
pub use factory::{MediaProducerFactory, ProducerKind};
pub use file_producer::{FillMode, Mp4Producer};
pub use mp4::{Mp4SampleReader, Mp4Writer, VideoTrackInfo};
pub use synthetic::SyntheticProducer;

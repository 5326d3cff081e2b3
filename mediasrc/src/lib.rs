//! # mediasrc - Custom Media Stream Source
//!
//! A media stream source that a pull-based rendering sink drives through
//! three events: start, sample request, and media failure. Samples come
//! from either a synthetic "roving square" generator or an MP4 file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediasrc::{PlayerConfig, PlayerPage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mediasrc::PlayerError> {
//!     let config = PlayerConfig::default();
//!     mediasrc::init_logging(&config.log_filter)?;
//!
//!     let mut page = PlayerPage::new(config)?;
//!     let report = page.on_navigated_to().await?;
//!     println!("Rendered {} samples", report.playback.samples_rendered);
//!     Ok(())
//! }
//! ```
//!
//! Lower-level pieces are re-exported for driving a source by hand:
//!
//! ```rust,no_run
//! use mediasrc::*;
//!
//! # async fn example() -> Result<(), MediaError> {
//! let source = configure(DescriptorKind::SyntheticRaw, &SourceParameters::default())?;
//! let mut adapter = StreamSourceAdapter::new(source.clone(), MediaProducerFactory::synthetic());
//! let sink = PullSink::new(SinkConfig {
//!     max_pulls: Some(30),
//!     ..Default::default()
//! });
//! let report = sink.play(&source, &mut adapter).await;
//! assert_eq!(report.samples_rendered, 30);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use mediasrc_core::{
    AdapterConfig, AdapterStats, AudioEncoding, DescriptorId, ErrorCategory, FrameRate,
    MediaError, MediaResult, MediaSample, MediaTime, PendingSample, Producer, ProducerFactory,
    RequestCompletion, RequestStatus, SampleDeferral, SampleOutcome, SampleRequest,
    SessionState, SourceCallbacks, StartingRequest, StreamDescriptor, StreamEncoding,
    StreamSource, StreamSourceAdapter, VideoEncoding, VideoSubtype,
};

pub use mediasrc_media::{
    configure, CaptureBackend, CaptureDevice, CaptureError, CaptureEvent, CapturePreview,
    DescriptorKind, FillMode, MediaProducerFactory, MockCaptureBackend, Mp4Producer,
    Mp4SampleReader, Mp4Writer, PreviewState, ProducerKind, SourceParameters, SyntheticProducer,
    VideoTrackInfo,
};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod page;
pub mod sink;

// Re-export main API types
pub use config::{PlaybackMode, PlayerConfig};
pub use error::{PlayerError, PlayerResult};
pub use event::SinkEvent;
pub use logging::init_logging;
pub use page::{PageReport, PlayerPage};
pub use sink::{PlaybackEnd, PlaybackReport, PullSink, SinkConfig};

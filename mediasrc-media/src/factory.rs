//! Producer factory over the synthetic and file-backed variants

use crate::file_producer::{FillMode, Mp4Producer};
use crate::synthetic::SyntheticProducer;
use mediasrc_core::{MediaError, MediaResult, Producer, ProducerFactory, StreamDescriptor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Which producer a session uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProducerKind {
    /// Roving-square generator
    Synthetic {
        /// End the stream after this many frames
        #[serde(default)]
        frame_limit: Option<u64>,
    },
    /// MP4 file reader
    File {
        path: PathBuf,
        #[serde(default)]
        fill_mode: FillMode,
    },
}

/// Opens exactly one producer variant per session
#[derive(Debug, Clone)]
pub struct MediaProducerFactory {
    kind: ProducerKind,
}

impl MediaProducerFactory {
    pub fn new(kind: ProducerKind) -> Self {
        Self { kind }
    }

    /// Unbounded synthetic generator
    pub fn synthetic() -> Self {
        Self::new(ProducerKind::Synthetic { frame_limit: None })
    }

    /// File reader with the given fill mode
    pub fn file(path: impl Into<PathBuf>, fill_mode: FillMode) -> Self {
        Self::new(ProducerKind::File {
            path: path.into(),
            fill_mode,
        })
    }

    pub fn kind(&self) -> &ProducerKind {
        &self.kind
    }
}

impl ProducerFactory for MediaProducerFactory {
    fn resource_name(&self) -> String {
        match &self.kind {
            ProducerKind::Synthetic { .. } => "synthetic generator".to_string(),
            ProducerKind::File { path, .. } => path.display().to_string(),
        }
    }

    fn open(&self, descriptor: &StreamDescriptor) -> MediaResult<Box<dyn Producer>> {
        let encoding =
            descriptor
                .video_encoding()
                .ok_or_else(|| MediaError::InvalidConfiguration {
                    message: "producers serve video descriptors only".to_string(),
                })?;

        match &self.kind {
            ProducerKind::Synthetic { frame_limit } => {
                let mut producer =
                    SyntheticProducer::new(encoding)?.with_frame_limit(*frame_limit);
                producer.initialize();
                Ok(Box::new(producer))
            }
            ProducerKind::File { path, fill_mode } => {
                let producer = Mp4Producer::open(path, *fill_mode)?;
                if producer.track().subtype != encoding.subtype {
                    warn!(
                        path = %path.display(),
                        container = %producer.track().subtype,
                        descriptor = %encoding.subtype,
                        "Container codec differs from the configured descriptor"
                    );
                }
                Ok(Box::new(producer))
            }
        }
    }
}

//! Building stream sources for the two descriptor kinds

use crate::mp4::Mp4SampleReader;
use mediasrc_core::{
    FrameRate, MediaError, MediaResult, StreamDescriptor, StreamSource, VideoEncoding,
    VideoSubtype,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Kind of descriptor to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    /// Uncompressed BGRA8 frames with a derived bitrate
    SyntheticRaw,
    /// Compressed video whose codec is read from an MP4 container
    FileVideo,
}

/// Parameters for [`configure`]
#[derive(Debug, Clone, PartialEq)]
pub struct SourceParameters {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Container to inspect; required for [`DescriptorKind::FileVideo`]
    pub path: Option<PathBuf>,
    /// Target buffer duration of the source
    pub buffer_time: Duration,
}

impl Default for SourceParameters {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: FrameRate::fps(30),
            path: None,
            buffer_time: Duration::ZERO,
        }
    }
}

/// Build a stream source for `kind`
///
/// For file video the container is probed for its codec. A container that
/// cannot be probed is not an error here: the descriptor falls back to H.264
/// at the configured dimensions and the open failure surfaces when the
/// session starts.
pub fn configure(kind: DescriptorKind, params: &SourceParameters) -> MediaResult<StreamSource> {
    let encoding = match kind {
        DescriptorKind::SyntheticRaw => VideoEncoding::uncompressed(
            VideoSubtype::Bgra8,
            params.width,
            params.height,
            params.frame_rate,
        )?,
        DescriptorKind::FileVideo => {
            let path = params
                .path
                .as_ref()
                .ok_or_else(|| MediaError::InvalidConfiguration {
                    message: "file video needs a path".to_string(),
                })?;

            match Mp4SampleReader::probe(path) {
                Ok(track) => {
                    let (width, height) = if track.width > 0 && track.height > 0 {
                        (track.width, track.height)
                    } else {
                        (params.width, params.height)
                    };
                    VideoEncoding::compressed(track.subtype, width, height, params.frame_rate)?
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not probe container; assuming H264"
                    );
                    VideoEncoding::compressed(
                        VideoSubtype::H264,
                        params.width,
                        params.height,
                        params.frame_rate,
                    )?
                }
            }
        }
    };

    info!(
        kind = ?kind,
        subtype = %encoding.subtype,
        width = encoding.width,
        height = encoding.height,
        frame_rate = %encoding.frame_rate,
        bitrate = ?encoding.bitrate,
        "Configured stream source"
    );

    Ok(StreamSource::new(StreamDescriptor::video(encoding)).with_buffer_time(params.buffer_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_raw() {
        let source = configure(DescriptorKind::SyntheticRaw, &SourceParameters::default()).unwrap();
        let enc = source.descriptor().video_encoding().unwrap();
        assert_eq!(enc.subtype, VideoSubtype::Bgra8);
        assert_eq!(enc.bitrate, Some(30 * 640 * 480 * 4));
        assert_eq!(source.buffer_time(), Duration::ZERO);
    }

    #[test]
    fn test_file_video_needs_path() {
        assert!(matches!(
            configure(DescriptorKind::FileVideo, &SourceParameters::default()),
            Err(MediaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_unprobeable_file_falls_back_to_h264() {
        let params = SourceParameters {
            path: Some(PathBuf::from("/nonexistent/big_buck_bunny.mp4")),
            ..Default::default()
        };
        let source = configure(DescriptorKind::FileVideo, &params).unwrap();
        let enc = source.descriptor().video_encoding().unwrap();
        assert_eq!(enc.subtype, VideoSubtype::H264);
        assert_eq!((enc.width, enc.height), (640, 480));
        assert_eq!(enc.bitrate, None);
    }
}

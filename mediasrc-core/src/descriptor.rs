//! Stream descriptors
//!
//! A descriptor is the metadata a sink negotiates with before it starts
//! pulling samples. Descriptors are immutable once built; the adapter owns
//! the one it was configured with for the whole session.

use crate::error::{MediaError, MediaResult};
use crate::time::FrameRate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identity of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorId(Uuid);

impl DescriptorId {
    /// Allocate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DescriptorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Video encoding subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoSubtype {
    /// Uncompressed 32-bit BGRA
    Bgra8,
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// VP9
    Vp9,
    /// AV1
    Av1,
    /// Anything else, by sample entry fourcc
    Unknown([u8; 4]),
}

impl VideoSubtype {
    /// Map an MP4 visual sample entry fourcc to a subtype
    pub fn from_fourcc(fourcc: [u8; 4]) -> Self {
        match &fourcc {
            b"avc1" | b"avc3" => VideoSubtype::H264,
            b"hvc1" | b"hev1" => VideoSubtype::Hevc,
            b"vp09" => VideoSubtype::Vp9,
            b"av01" => VideoSubtype::Av1,
            _ => VideoSubtype::Unknown(fourcc),
        }
    }

    /// Bytes per pixel for uncompressed subtypes
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            VideoSubtype::Bgra8 => Some(4),
            _ => None,
        }
    }

    /// Whether samples of this subtype are compressed
    pub fn is_compressed(&self) -> bool {
        self.bytes_per_pixel().is_none()
    }
}

impl fmt::Display for VideoSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSubtype::Bgra8 => write!(f, "BGRA8"),
            VideoSubtype::H264 => write!(f, "H264"),
            VideoSubtype::Hevc => write!(f, "HEVC"),
            VideoSubtype::Vp9 => write!(f, "VP9"),
            VideoSubtype::Av1 => write!(f, "AV1"),
            VideoSubtype::Unknown(cc) => write!(f, "unknown({})", String::from_utf8_lossy(cc)),
        }
    }
}

/// Video encoding properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEncoding {
    pub subtype: VideoSubtype,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Bits per second; `None` when left to the decoder
    pub bitrate: Option<u64>,
}

impl VideoEncoding {
    /// Uncompressed encoding with the bitrate derived from its geometry:
    /// `bytes_per_pixel * width * height * frame_rate`
    pub fn uncompressed(
        subtype: VideoSubtype,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
    ) -> MediaResult<Self> {
        let bytes_per_pixel = subtype.bytes_per_pixel().ok_or_else(|| {
            MediaError::InvalidConfiguration {
                message: format!("{} is not an uncompressed subtype", subtype),
            }
        })?;
        let encoding = Self {
            subtype,
            width,
            height,
            frame_rate,
            bitrate: None,
        };
        encoding.validate()?;

        let bitrate = bytes_per_pixel as u64
            * width as u64
            * height as u64
            * frame_rate.numerator as u64
            / frame_rate.denominator as u64;
        Ok(Self {
            bitrate: Some(bitrate),
            ..encoding
        })
    }

    /// Compressed encoding; the bitrate is left unspecified
    pub fn compressed(
        subtype: VideoSubtype,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
    ) -> MediaResult<Self> {
        let encoding = Self {
            subtype,
            width,
            height,
            frame_rate,
            bitrate: None,
        };
        encoding.validate()?;
        Ok(encoding)
    }

    /// Size in bytes of one uncompressed frame
    pub fn frame_size(&self) -> Option<usize> {
        self.subtype
            .bytes_per_pixel()
            .map(|bpp| bpp as usize * self.width as usize * self.height as usize)
    }

    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Invalid resolution".to_string(),
            });
        }

        if !self.frame_rate.is_valid() {
            return Err(MediaError::InvalidConfiguration {
                message: format!("Invalid frame rate {}", self.frame_rate),
            });
        }

        Ok(())
    }
}

/// Audio encoding properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEncoding {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u16,
}

/// Encoding carried by a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEncoding {
    /// Video stream
    Video(VideoEncoding),
    /// Audio stream
    Audio(AudioEncoding),
}

/// Metadata describing one media stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    id: DescriptorId,
    encoding: StreamEncoding,
}

impl StreamDescriptor {
    /// Video descriptor
    pub fn video(encoding: VideoEncoding) -> Self {
        Self {
            id: DescriptorId::new(),
            encoding: StreamEncoding::Video(encoding),
        }
    }

    /// Audio descriptor
    pub fn audio(encoding: AudioEncoding) -> Self {
        Self {
            id: DescriptorId::new(),
            encoding: StreamEncoding::Audio(encoding),
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn encoding(&self) -> &StreamEncoding {
        &self.encoding
    }

    pub fn is_video(&self) -> bool {
        matches!(self.encoding, StreamEncoding::Video(_))
    }

    /// Video encoding, if this is a video descriptor
    pub fn video_encoding(&self) -> Option<&VideoEncoding> {
        match &self.encoding {
            StreamEncoding::Video(v) => Some(v),
            StreamEncoding::Audio(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_bitrate() {
        let enc = VideoEncoding::uncompressed(VideoSubtype::Bgra8, 640, 480, FrameRate::fps(30))
            .unwrap();
        assert_eq!(enc.bitrate, Some(4 * 640 * 480 * 30));
        assert_eq!(enc.frame_size(), Some(640 * 480 * 4));
    }

    #[test]
    fn test_compressed_subtype_rejected_as_uncompressed() {
        let result = VideoEncoding::uncompressed(VideoSubtype::H264, 640, 480, FrameRate::fps(30));
        assert!(matches!(
            result,
            Err(MediaError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(VideoEncoding::compressed(VideoSubtype::H264, 0, 480, FrameRate::fps(30)).is_err());
        assert!(VideoEncoding::compressed(VideoSubtype::H264, 640, 480, FrameRate::new(0, 1)).is_err());
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(VideoSubtype::from_fourcc(*b"avc1"), VideoSubtype::H264);
        assert_eq!(VideoSubtype::from_fourcc(*b"hev1"), VideoSubtype::Hevc);
        assert_eq!(
            VideoSubtype::from_fourcc(*b"mp4v"),
            VideoSubtype::Unknown(*b"mp4v")
        );
    }

    #[test]
    fn test_descriptor_ids_are_unique() {
        let enc = VideoEncoding::compressed(VideoSubtype::H264, 640, 480, FrameRate::fps(30))
            .unwrap();
        let a = StreamDescriptor::video(enc.clone());
        let b = StreamDescriptor::video(enc);
        assert_ne!(a.id(), b.id());
        assert!(a.is_video());
    }
}

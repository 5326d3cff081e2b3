//! Synthetic BGRA8 frame generator
//!
//! Draws a small "roving square" on an otherwise black canvas. The square
//! starts 40 bytes further into the canvas on every frame and wraps around
//! at the end, so consecutive frames are visibly different without any
//! external input.

use bytes::Bytes;
use mediasrc_core::{
    FrameRate, MediaError, MediaResult, MediaSample, Producer, SampleRequest, VideoEncoding,
    VideoSubtype,
};
use tracing::{debug, info};

/// One BGRA pixel of the square
const SQUARE_PIXEL: [u8; 4] = [0xA4, 0xA4, 0x12, 0xFF];
/// Square side in pixels
const SQUARE_SIZE: usize = 10;
const BYTES_PER_PIXEL: usize = 4;
const SQUARE_ROW_BYTES: usize = SQUARE_SIZE * BYTES_PER_PIXEL;

/// Produces raw BGRA8 frames with exact `1 / frame_rate` spacing
#[derive(Debug)]
pub struct SyntheticProducer {
    width: usize,
    height: usize,
    frame_rate: FrameRate,
    frame_index: u64,
    frame_limit: Option<u64>,
    square_row: Bytes,
}

impl SyntheticProducer {
    /// Create a generator for an uncompressed BGRA8 encoding
    pub fn new(encoding: &VideoEncoding) -> MediaResult<Self> {
        if encoding.subtype != VideoSubtype::Bgra8 {
            return Err(MediaError::UnsupportedFormat {
                format: format!("synthetic frames need BGRA8, got {}", encoding.subtype),
            });
        }
        encoding.validate()?;

        Ok(Self {
            width: encoding.width as usize,
            height: encoding.height as usize,
            frame_rate: encoding.frame_rate,
            frame_index: 0,
            frame_limit: None,
            square_row: Bytes::from(SQUARE_PIXEL.repeat(SQUARE_SIZE)),
        })
    }

    /// Stop with end-of-stream after `limit` frames
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    /// Reset to frame zero
    pub fn initialize(&mut self) {
        self.frame_index = 0;
        info!(
            width = self.width,
            height = self.height,
            frame_rate = %self.frame_rate,
            "Synthetic producer initialized"
        );
    }

    /// Frames produced so far
    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    fn canvas_size(&self) -> usize {
        self.width * self.height * BYTES_PER_PIXEL
    }

    /// Byte offset of the square's top-left pixel in frame `index`
    pub fn square_offset(&self, index: u64) -> usize {
        let total = self.canvas_size() as u64;
        ((index * SQUARE_ROW_BYTES as u64) % total) as usize
    }

    /// Render frame `index`
    pub fn render_frame(&self, index: u64) -> Bytes {
        let total = self.canvas_size();
        let mut canvas = vec![0u8; total];
        let start = self.square_offset(index);
        let stride = self.width * BYTES_PER_PIXEL;

        for row in 0..SQUARE_SIZE {
            let offset = start + row * stride;
            if offset + SQUARE_ROW_BYTES < total {
                canvas[offset..offset + SQUARE_ROW_BYTES].copy_from_slice(&self.square_row);
            }
        }

        Bytes::from(canvas)
    }
}

impl Producer for SyntheticProducer {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fill(&mut self, request: &mut SampleRequest) -> MediaResult<()> {
        if let Some(limit) = self.frame_limit {
            if self.frame_index >= limit {
                debug!(limit, "Synthetic frame limit reached");
                return request.set_end_of_stream();
            }
        }

        let index = self.frame_index;
        request.set_sample(MediaSample {
            data: self.render_frame(index),
            timestamp: self.frame_rate.frame_time(index),
            duration: self.frame_rate.frame_duration(),
            is_keyframe: true,
        })?;
        self.frame_index += 1;
        Ok(())
    }
}

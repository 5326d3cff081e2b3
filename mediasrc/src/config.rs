//! Player configuration

use crate::error::{PlayerError, PlayerResult};
use mediasrc_core::{AdapterConfig, FrameRate};
use mediasrc_media::{DescriptorKind, FillMode, ProducerKind, SourceParameters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which producer feeds the stream source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Roving-square generator
    #[default]
    Synthetic,
    /// MP4 file from the asset directory
    File,
}

/// Player page configuration
///
/// Every field has a default, so a JSON document only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Producer to use
    pub mode: PlaybackMode,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub frame_rate: u32,
    /// Directory media files are resolved against
    pub asset_dir: PathBuf,
    /// MP4 file played in file mode
    pub media_file: PathBuf,
    /// How the file producer completes requests
    pub fill_mode: FillMode,
    /// Target buffer duration of the source, in milliseconds
    pub buffer_time_ms: u64,
    /// Stop after this many sample requests
    pub max_pulls: Option<u64>,
    /// End the synthetic stream after this many frames
    pub frame_limit: Option<u64>,
    /// Run the camera preview alongside playback
    pub enable_camera_preview: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Recoverable fill failures tolerated in a row
    pub max_consecutive_fill_failures: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Synthetic,
            width: 640,
            height: 480,
            frame_rate: 30,
            asset_dir: PathBuf::from("Assets"),
            media_file: PathBuf::from("big_buck_bunny.mp4"),
            fill_mode: FillMode::Synchronous,
            buffer_time_ms: 0,
            max_pulls: Some(300),
            frame_limit: None,
            enable_camera_preview: true,
            log_filter: "info".to_string(),
            max_consecutive_fill_failures: AdapterConfig::default().max_consecutive_fill_failures,
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> PlayerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> PlayerResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PlayerError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration
    pub fn validate(&self) -> PlayerResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlayerError::InvalidConfiguration {
                message: format!("Invalid resolution {}x{}", self.width, self.height),
            });
        }

        if self.frame_rate == 0 {
            return Err(PlayerError::InvalidConfiguration {
                message: "Frame rate must be positive".to_string(),
            });
        }

        if self.max_consecutive_fill_failures == 0 {
            return Err(PlayerError::InvalidConfiguration {
                message: "max_consecutive_fill_failures must be at least 1".to_string(),
            });
        }

        if self.mode == PlaybackMode::File && self.media_file.as_os_str().is_empty() {
            return Err(PlayerError::InvalidConfiguration {
                message: "File mode needs a media file".to_string(),
            });
        }

        Ok(())
    }

    /// Media file resolved against the asset directory
    pub fn media_path(&self) -> PathBuf {
        self.asset_dir.join(&self.media_file)
    }

    /// Descriptor kind matching the playback mode
    pub fn descriptor_kind(&self) -> DescriptorKind {
        match self.mode {
            PlaybackMode::Synthetic => DescriptorKind::SyntheticRaw,
            PlaybackMode::File => DescriptorKind::FileVideo,
        }
    }

    /// Parameters for [`mediasrc_media::configure`]
    pub fn source_parameters(&self) -> SourceParameters {
        SourceParameters {
            width: self.width,
            height: self.height,
            frame_rate: FrameRate::fps(self.frame_rate),
            path: match self.mode {
                PlaybackMode::Synthetic => None,
                PlaybackMode::File => Some(self.media_path()),
            },
            buffer_time: Duration::from_millis(self.buffer_time_ms),
        }
    }

    /// Producer the factory should open
    pub fn producer_kind(&self) -> ProducerKind {
        match self.mode {
            PlaybackMode::Synthetic => ProducerKind::Synthetic {
                frame_limit: self.frame_limit,
            },
            PlaybackMode::File => ProducerKind::File {
                path: self.media_path(),
                fill_mode: self.fill_mode,
            },
        }
    }

    /// Adapter settings
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            max_consecutive_fill_failures: self.max_consecutive_fill_failures,
        }
    }
}

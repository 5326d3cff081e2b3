//! Player page
//!
//! Wires a configured stream source to a pull sink and runs the camera
//! preview next to it. Both run on the navigating task; they share no
//! mutable state, so a failing preview cannot disturb playback.

use crate::config::PlayerConfig;
use crate::error::PlayerResult;
use crate::sink::{PlaybackReport, PullSink, SinkConfig};
use mediasrc_core::{AdapterStats, SessionState, StreamSourceAdapter};
use mediasrc_media::{configure, CaptureBackend, CapturePreview, MediaProducerFactory, PreviewState};
use tracing::{info, warn};

/// Outcome of one navigation
#[derive(Debug, Clone)]
pub struct PageReport {
    /// What the sink rendered
    pub playback: PlaybackReport,
    /// Adapter state when playback stopped
    pub session_state: SessionState,
    /// Adapter counters
    pub adapter_stats: AdapterStats,
    /// Last failure the adapter absorbed
    pub adapter_error: Option<String>,
    /// Preview state, when the preview is enabled
    pub preview_state: Option<PreviewState>,
    /// Preview failure, if any
    pub preview_error: Option<String>,
}

/// Page hosting the media player and the camera preview
#[derive(Debug)]
pub struct PlayerPage {
    config: PlayerConfig,
    sink_config: SinkConfig,
    preview: Option<CapturePreview>,
}

impl PlayerPage {
    /// Create a page; the preview uses the mock capture backend
    pub fn new(config: PlayerConfig) -> PlayerResult<Self> {
        config.validate()?;
        let sink_config = SinkConfig {
            max_pulls: config.max_pulls,
            max_failed_deferrals_in_a_row: config.max_consecutive_fill_failures,
            ..Default::default()
        };
        let preview = config.enable_camera_preview.then(CapturePreview::mock);

        Ok(Self {
            config,
            sink_config,
            preview,
        })
    }

    /// Use a different capture backend for the preview
    pub fn with_capture_backend(mut self, backend: Box<dyn CaptureBackend>) -> Self {
        self.preview = Some(CapturePreview::new(backend));
        self
    }

    /// Override sink settings
    pub fn with_sink_config(mut self, sink_config: SinkConfig) -> Self {
        self.sink_config = sink_config;
        self
    }

    /// Page configuration
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Camera preview, when enabled
    pub fn preview(&self) -> Option<&CapturePreview> {
        self.preview.as_ref()
    }

    /// Build a source for the configured mode, then play it while the preview starts
    ///
    /// Only failures to build the source are returned; everything that goes
    /// wrong once the session is running ends up in the report.
    pub async fn on_navigated_to(&mut self) -> PlayerResult<PageReport> {
        let source = configure(self.config.descriptor_kind(), &self.config.source_parameters())?;
        let factory = MediaProducerFactory::new(self.config.producer_kind());
        let mut adapter =
            StreamSourceAdapter::with_config(source.clone(), factory, self.config.adapter_config());

        info!(mode = ?self.config.mode, "Navigated to player page");

        let sink = PullSink::new(self.sink_config.clone());
        let mut preview = self.preview.take();

        let (playback, preview_result) = tokio::join!(sink.play(&source, &mut adapter), async {
            match preview.as_mut() {
                Some(p) => Some(p.start().await),
                None => None,
            }
        });

        let preview_error = match preview_result {
            Some(Err(e)) => {
                warn!(error = %e, "Camera preview unavailable; playback unaffected");
                Some(e.to_string())
            }
            _ => None,
        };
        let preview_state = preview.as_ref().map(|p| p.state());
        self.preview = preview;

        Ok(PageReport {
            playback,
            session_state: adapter.state(),
            adapter_stats: adapter.stats(),
            adapter_error: adapter.last_error().map(|e| e.to_string()),
            preview_state,
            preview_error,
        })
    }

    /// Stop the preview when leaving the page
    pub async fn on_navigated_from(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            if let Err(e) = preview.stop().await {
                warn!(error = %e, "Failed to stop camera preview");
            }
        }
    }
}

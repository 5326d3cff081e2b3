//! Camera preview
//!
//! The preview is an independent live feed that runs next to playback. It
//! goes through two suspension points, device initialization and then
//! starting the preview, and reports its progress on a broadcast channel.
//! Failures stay inside the preview; nothing here touches a stream source.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Capture errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No device to open
    #[error("No capture device available")]
    NoDevice,

    /// Device initialization failed
    #[error("Capture device {device_id} failed to initialize: {reason}")]
    InitializationFailed {
        /// Device identifier
        device_id: String,
        /// Failure reason
        reason: String,
    },

    /// Preview could not be started
    #[error("Preview failed on {device_id}: {reason}")]
    PreviewFailed {
        /// Device identifier
        device_id: String,
        /// Failure reason
        reason: String,
    },

    /// Operation not valid in the current preview state
    #[error("Invalid preview state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub id: String,
    pub name: String,
}

/// Preview lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Initialized,
    Previewing,
    Stopped,
    Failed,
}

/// Preview events
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Initialized { device_id: String },
    PreviewStarted { device_id: String },
    PreviewStopped { device_id: String },
    PreviewFailed { error: String },
}

/// Platform capture backend
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Open and initialize the capture device
    async fn initialize(&mut self) -> CaptureResult<CaptureDevice>;

    /// Start streaming the device into the preview surface
    async fn start_preview(&mut self) -> CaptureResult<()>;

    /// Stop the preview
    async fn stop_preview(&mut self) -> CaptureResult<()>;
}

/// Mock capture backend for tests and platforms without a device driver
#[derive(Debug, Clone)]
pub struct MockCaptureBackend {
    device: CaptureDevice,
    fail_initialize: bool,
    fail_preview: bool,
    init_delay: Duration,
    initialized: bool,
    previewing: bool,
}

impl MockCaptureBackend {
    pub fn new() -> Self {
        Self {
            device: CaptureDevice {
                id: "mock_camera_0".to_string(),
                name: "Mock Camera".to_string(),
            },
            fail_initialize: false,
            fail_preview: false,
            init_delay: Duration::ZERO,
            initialized: false,
            previewing: false,
        }
    }

    /// Make `initialize` fail
    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Make `start_preview` fail
    pub fn failing_preview(mut self) -> Self {
        self.fail_preview = true;
        self
    }

    /// Simulated device initialization time
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }
}

impl Default for MockCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for MockCaptureBackend {
    async fn initialize(&mut self) -> CaptureResult<CaptureDevice> {
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }

        if self.fail_initialize {
            return Err(CaptureError::InitializationFailed {
                device_id: self.device.id.clone(),
                reason: "mock device configured to fail".to_string(),
            });
        }

        self.initialized = true;
        Ok(self.device.clone())
    }

    async fn start_preview(&mut self) -> CaptureResult<()> {
        if !self.initialized {
            return Err(CaptureError::InvalidState {
                message: "preview started before initialization".to_string(),
            });
        }
        if self.fail_preview {
            return Err(CaptureError::PreviewFailed {
                device_id: self.device.id.clone(),
                reason: "mock preview configured to fail".to_string(),
            });
        }

        self.previewing = true;
        Ok(())
    }

    async fn stop_preview(&mut self) -> CaptureResult<()> {
        self.previewing = false;
        Ok(())
    }
}

/// Drives a capture backend through initialize and start-preview
pub struct CapturePreview {
    backend: Box<dyn CaptureBackend>,
    state: PreviewState,
    device: Option<CaptureDevice>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CapturePreview {
    /// Create new preview over a backend
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            backend,
            state: PreviewState::Idle,
            device: None,
            event_tx,
        }
    }

    /// Preview over the mock backend
    pub fn mock() -> Self {
        Self::new(Box::new(MockCaptureBackend::new()))
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    /// Device opened by [`CapturePreview::start`]
    pub fn device(&self) -> Option<&CaptureDevice> {
        self.device.as_ref()
    }

    /// Subscribe to preview events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Initialize the device, then start the preview
    pub async fn start(&mut self) -> CaptureResult<()> {
        if self.state != PreviewState::Idle && self.state != PreviewState::Stopped {
            return Err(CaptureError::InvalidState {
                message: format!("cannot start preview from {:?}", self.state),
            });
        }

        let device = match self.backend.initialize().await {
            Ok(device) => device,
            Err(e) => return Err(self.fail(e)),
        };
        info!(device = %device.name, "Capture device initialized");
        self.state = PreviewState::Initialized;
        let _ = self.event_tx.send(CaptureEvent::Initialized {
            device_id: device.id.clone(),
        });

        if let Err(e) = self.backend.start_preview().await {
            return Err(self.fail(e));
        }
        info!(device = %device.name, "Preview started");
        self.state = PreviewState::Previewing;
        let _ = self.event_tx.send(CaptureEvent::PreviewStarted {
            device_id: device.id.clone(),
        });
        self.device = Some(device);

        Ok(())
    }

    /// Stop a running preview
    pub async fn stop(&mut self) -> CaptureResult<()> {
        if self.state != PreviewState::Previewing {
            warn!(state = ?self.state, "Stop requested while not previewing");
            return Ok(());
        }

        self.backend.stop_preview().await?;
        self.state = PreviewState::Stopped;
        if let Some(device) = &self.device {
            let _ = self.event_tx.send(CaptureEvent::PreviewStopped {
                device_id: device.id.clone(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, e: CaptureError) -> CaptureError {
        error!(error = %e, "Camera preview failed");
        self.state = PreviewState::Failed;
        let _ = self.event_tx.send(CaptureEvent::PreviewFailed {
            error: e.to_string(),
        });
        e
    }
}

impl std::fmt::Debug for CapturePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePreview")
            .field("state", &self.state)
            .field("device", &self.device)
            .finish()
    }
}

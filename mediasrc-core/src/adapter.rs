//! Stream source adapter
//!
//! Bridges a pull-based sink to a [`Producer`]. The sink drives the adapter
//! through [`SourceCallbacks`]; the adapter never spawns work of its own and
//! never lets an error or panic escape a callback.
//!
//! Per session the adapter walks
//! `Uninitialized -> Starting -> Running -> {Faulted | Ended}`.

use crate::error::{IntoMediaError, MediaError};
use crate::producer::{Producer, ProducerFactory};
use crate::request::{RequestStatus, SampleRequest, StartingRequest};
use crate::source::{SourceCallbacks, StreamSource};
use crate::time::MediaTime;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Session state of the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No start event yet
    Uninitialized,
    /// Producer is being initialized
    Starting,
    /// Serving sample requests
    Running,
    /// Start failed or the producer failed fatally; nothing more is served
    Faulted,
    /// Producer reported exhaustion
    Ended,
}

impl SessionState {
    /// Whether the state can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Faulted | SessionState::Ended)
    }
}

/// Adapter configuration
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Recoverable fill failures tolerated in a row before the session faults
    pub max_consecutive_fill_failures: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_consecutive_fill_failures: 3,
        }
    }
}

/// Adapter statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// Sample requests received
    pub requests: u64,
    /// Requests filled synchronously with a sample
    pub samples_delivered: u64,
    /// Requests deferred by the producer
    pub deferred: u64,
    /// Requests not delegated (wrong descriptor or session not running)
    pub ignored: u64,
    /// Fill failures caught at the boundary
    pub fill_failures: u64,
    /// Failures reported by the sink
    pub sink_failures: u64,
}

/// State machine binding one [`StreamSource`] to the producer a factory opens
pub struct StreamSourceAdapter<F: ProducerFactory> {
    source: StreamSource,
    factory: F,
    config: AdapterConfig,
    producer: Option<Box<dyn Producer>>,
    state: SessionState,
    consecutive_failures: u32,
    last_error: Option<MediaError>,
    stats: Arc<RwLock<AdapterStats>>,
}

impl<F: ProducerFactory> StreamSourceAdapter<F> {
    /// Create new adapter with default configuration
    pub fn new(source: StreamSource, factory: F) -> Self {
        Self::with_config(source, factory, AdapterConfig::default())
    }

    /// Create new adapter with custom configuration
    pub fn with_config(source: StreamSource, factory: F, config: AdapterConfig) -> Self {
        Self {
            source,
            factory,
            config,
            producer: None,
            state: SessionState::Uninitialized,
            consecutive_failures: 0,
            last_error: None,
            stats: Arc::new(RwLock::new(AdapterStats::default())),
        }
    }

    pub fn source(&self) -> &StreamSource {
        &self.source
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Most recent failure caught at a callback boundary
    pub fn last_error(&self) -> Option<&MediaError> {
        self.last_error.as_ref()
    }

    /// Current statistics
    pub fn stats(&self) -> AdapterStats {
        self.stats.read().clone()
    }

    /// Shared handle to the statistics, readable while the sink owns the adapter
    pub fn stats_handle(&self) -> Arc<RwLock<AdapterStats>> {
        self.stats.clone()
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Session state change");
            self.state = next;
        }
    }

    fn fault(&mut self, error: MediaError) {
        self.last_error = Some(error);
        self.producer = None;
        self.transition(SessionState::Faulted);
    }

    fn start_producer(&mut self) {
        self.transition(SessionState::Starting);

        let factory = &self.factory;
        let descriptor = self.source.descriptor();
        let opened = catch_unwind(AssertUnwindSafe(|| factory.open(descriptor)))
            .unwrap_or_else(|panic| Err(panic.into_media_error("open")));

        match opened {
            Ok(producer) => {
                info!(producer = producer.name(), "Producer initialized");
                self.producer = Some(producer);
                self.transition(SessionState::Running);
            }
            Err(e) => {
                let err = MediaError::open_failure(self.factory.resource_name(), e);
                error!(error = %err, "Failed to initialize producer; session faulted");
                self.fault(err);
            }
        }
    }

    fn handle_fill_failure(&mut self, producer_name: String, cause: MediaError) {
        self.stats.write().fill_failures += 1;
        let err = MediaError::fill_failure(producer_name, cause);

        if !err.is_recoverable() {
            error!(error = %err, "Sample fill failed; session faulted");
            self.fault(err);
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_consecutive_fill_failures {
            error!(
                error = %err,
                failures = self.consecutive_failures,
                "Too many consecutive fill failures; session faulted"
            );
            self.fault(err);
        } else {
            warn!(
                error = %err,
                failures = self.consecutive_failures,
                "Sample fill failed; waiting for the next request"
            );
            self.last_error = Some(err);
        }
    }
}

impl<F: ProducerFactory> SourceCallbacks for StreamSourceAdapter<F> {
    fn on_starting(&mut self, request: &mut StartingRequest) {
        info!("Starting.");

        if self.state == SessionState::Uninitialized {
            self.start_producer();
        } else {
            warn!(state = ?self.state, "Start event received again; ignoring");
        }

        // No seeking or resume support.
        request.set_actual_start_position(MediaTime::ZERO);
    }

    fn on_sample_requested(&mut self, request: &mut SampleRequest) {
        self.stats.write().requests += 1;

        let target = request.descriptor();
        if !target.is_video() || target.id() != self.source.descriptor().id() {
            debug!(
                descriptor = %target.id(),
                "Ignoring request for a descriptor other than the video stream"
            );
            self.stats.write().ignored += 1;
            return;
        }

        if self.state != SessionState::Running {
            debug!(state = ?self.state, "Ignoring sample request; session not running");
            self.stats.write().ignored += 1;
            return;
        }

        let Some(producer) = self.producer.as_mut() else {
            self.stats.write().ignored += 1;
            self.fault(MediaError::InvalidState {
                message: "running session without a producer".to_string(),
            });
            return;
        };

        let name = producer.name().to_string();
        let result = catch_unwind(AssertUnwindSafe(|| producer.fill(request)))
            .unwrap_or_else(|panic| Err(panic.into_media_error("fill")));
        let exhausted = producer.is_exhausted();

        if let Err(e) = result {
            self.handle_fill_failure(name, e);
            return;
        }
        self.consecutive_failures = 0;

        match request.status() {
            RequestStatus::Filled => self.stats.write().samples_delivered += 1,
            RequestStatus::Deferred => self.stats.write().deferred += 1,
            RequestStatus::EndOfStream => {
                info!(producer = %name, "End of stream.");
                self.transition(SessionState::Ended);
            }
            RequestStatus::Empty => {
                warn!(producer = %name, "Producer returned without completing the request");
            }
        }

        if exhausted && self.state == SessionState::Running {
            info!(producer = %name, "Producer exhausted");
            self.transition(SessionState::Ended);
        }
    }

    fn on_media_failed(&mut self, message: &str) {
        error!(error = message, "Load media failed.");
        self.stats.write().sink_failures += 1;
        self.last_error = Some(MediaError::SinkMediaFailure {
            message: message.to_string(),
        });
    }
}

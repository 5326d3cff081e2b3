//! Sample and starting requests
//!
//! A [`SampleRequest`] is one pull from the sink. Whoever handles it leaves it
//! in exactly one of three states before returning: filled with a sample,
//! marked end-of-stream, or deferred. A deferred request is completed later
//! through the [`SampleDeferral`] handed out by [`SampleRequest::defer`].

use crate::descriptor::StreamDescriptor;
use crate::error::{MediaError, MediaResult};
use crate::time::MediaTime;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::oneshot;

/// One unit of media data handed to the sink
#[derive(Debug, Clone)]
pub struct MediaSample {
    /// Sample payload (raw pixels or one encoded access unit)
    pub data: Bytes,
    /// Presentation timestamp
    pub timestamp: MediaTime,
    /// Sample duration
    pub duration: MediaTime,
    /// Whether the sample can be decoded on its own
    pub is_keyframe: bool,
}

/// What a completed request resolved to
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// A sample to render
    Sample(MediaSample),
    /// The producer has nothing more to give
    EndOfStream,
}

impl SampleOutcome {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SampleOutcome::EndOfStream)
    }

    /// The sample, if any
    pub fn sample(&self) -> Option<&MediaSample> {
        match self {
            SampleOutcome::Sample(s) => Some(s),
            SampleOutcome::EndOfStream => None,
        }
    }
}

/// Coarse status of a request, for observers that must not consume it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Nothing written yet
    Empty,
    /// Holds a sample
    Filled,
    /// Marked end-of-stream
    EndOfStream,
    /// Deferred for asynchronous completion
    Deferred,
}

type DeferredResult = MediaResult<SampleOutcome>;

enum Slot {
    Empty,
    Ready(SampleOutcome),
    Deferred(oneshot::Receiver<DeferredResult>),
}

/// One pull-based demand from the sink
pub struct SampleRequest {
    descriptor: Arc<StreamDescriptor>,
    slot: Slot,
}

impl SampleRequest {
    /// New empty request targeting `descriptor`
    pub fn new(descriptor: Arc<StreamDescriptor>) -> Self {
        Self {
            descriptor,
            slot: Slot::Empty,
        }
    }

    /// Descriptor this request targets
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> RequestStatus {
        match &self.slot {
            Slot::Empty => RequestStatus::Empty,
            Slot::Ready(SampleOutcome::Sample(_)) => RequestStatus::Filled,
            Slot::Ready(SampleOutcome::EndOfStream) => RequestStatus::EndOfStream,
            Slot::Deferred(_) => RequestStatus::Deferred,
        }
    }

    /// Fill the request with a sample
    pub fn set_sample(&mut self, sample: MediaSample) -> MediaResult<()> {
        self.ensure_empty("set_sample")?;
        self.slot = Slot::Ready(SampleOutcome::Sample(sample));
        Ok(())
    }

    /// Mark the request as end-of-stream
    pub fn set_end_of_stream(&mut self) -> MediaResult<()> {
        self.ensure_empty("set_end_of_stream")?;
        self.slot = Slot::Ready(SampleOutcome::EndOfStream);
        Ok(())
    }

    /// Defer the request; it completes when the returned handle does
    pub fn defer(&mut self) -> MediaResult<SampleDeferral> {
        self.ensure_empty("defer")?;
        let (tx, rx) = oneshot::channel();
        self.slot = Slot::Deferred(rx);
        Ok(SampleDeferral { tx })
    }

    /// Sample currently held, if filled synchronously
    pub fn sample(&self) -> Option<&MediaSample> {
        match &self.slot {
            Slot::Ready(outcome) => outcome.sample(),
            _ => None,
        }
    }

    /// Consume the request into what the sink should do next
    pub fn into_completion(self) -> RequestCompletion {
        match self.slot {
            Slot::Empty => RequestCompletion::Unfulfilled,
            Slot::Ready(outcome) => RequestCompletion::Ready(outcome),
            Slot::Deferred(rx) => RequestCompletion::Deferred(PendingSample { rx }),
        }
    }

    fn ensure_empty(&self, op: &str) -> MediaResult<()> {
        match self.slot {
            Slot::Empty => Ok(()),
            _ => Err(MediaError::InvalidState {
                message: format!("{} on a request that is already {:?}", op, self.status()),
            }),
        }
    }
}

impl std::fmt::Debug for SampleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRequest")
            .field("descriptor", &self.descriptor.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Result of handling a request, from the sink's point of view
#[derive(Debug)]
pub enum RequestCompletion {
    /// Completed synchronously
    Ready(SampleOutcome),
    /// Completes later
    Deferred(PendingSample),
    /// Nobody wrote anything (ignored, or the session is not running)
    Unfulfilled,
}

/// Sink side of a deferred request
#[derive(Debug)]
pub struct PendingSample {
    rx: oneshot::Receiver<DeferredResult>,
}

impl PendingSample {
    /// Wait for the producer to complete the deferral
    pub async fn wait(self) -> MediaResult<SampleOutcome> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(MediaError::DeferralDropped),
        }
    }
}

/// Producer side of a deferred request
///
/// Dropping it without completing resolves the request with
/// [`MediaError::DeferralDropped`].
#[derive(Debug)]
pub struct SampleDeferral {
    tx: oneshot::Sender<DeferredResult>,
}

impl SampleDeferral {
    /// Complete with a sample
    pub fn complete(self, sample: MediaSample) {
        let _ = self.tx.send(Ok(SampleOutcome::Sample(sample)));
    }

    /// Complete as end-of-stream
    pub fn end_of_stream(self) {
        let _ = self.tx.send(Ok(SampleOutcome::EndOfStream));
    }

    /// Complete with a failure
    pub fn fail(self, error: MediaError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Request carried by the start event
#[derive(Debug, Default)]
pub struct StartingRequest {
    actual_start: Option<MediaTime>,
}

impl StartingRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare where playback actually starts
    pub fn set_actual_start_position(&mut self, position: MediaTime) {
        self.actual_start = Some(position);
    }

    /// Position declared by the handler, if any
    pub fn actual_start_position(&self) -> Option<MediaTime> {
        self.actual_start
    }
}

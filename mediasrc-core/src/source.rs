//! Stream sources and the callbacks a sink drives them through

use crate::descriptor::StreamDescriptor;
use crate::request::{SampleRequest, StartingRequest};
use std::sync::Arc;
use std::time::Duration;

/// One stream descriptor bound to a buffering policy
///
/// The source owns its descriptor for the whole session; requests only ever
/// get shared read access to it.
#[derive(Debug, Clone)]
pub struct StreamSource {
    descriptor: Arc<StreamDescriptor>,
    buffer_time: Duration,
}

impl StreamSource {
    /// Source with zero buffer latency
    pub fn new(descriptor: StreamDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            buffer_time: Duration::ZERO,
        }
    }

    /// Override the target buffer duration
    pub fn with_buffer_time(mut self, buffer_time: Duration) -> Self {
        self.buffer_time = buffer_time;
        self
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn buffer_time(&self) -> Duration {
        self.buffer_time
    }

    /// New request targeting this source's descriptor
    pub fn create_request(&self) -> SampleRequest {
        SampleRequest::new(self.descriptor.clone())
    }
}

/// The events a rendering sink raises on a stream source
///
/// Implementations must not panic or otherwise fail out of these methods:
/// every entry point is a hard boundary for the host dispatcher.
pub trait SourceCallbacks {
    /// Playback is beginning; declare the actual start position
    fn on_starting(&mut self, request: &mut StartingRequest);

    /// The sink wants the next sample
    fn on_sample_requested(&mut self, request: &mut SampleRequest);

    /// The sink failed to render what it was given
    fn on_media_failed(&mut self, message: &str);
}

//! Events a rendering sink raises on a stream source

use mediasrc_core::{SampleRequest, SourceCallbacks, StartingRequest};
use tracing::trace;

/// One sink-to-source event
#[derive(Debug)]
pub enum SinkEvent<'a> {
    /// Playback is starting
    Starting(&'a mut StartingRequest),
    /// The sink wants the next sample
    SampleRequested(&'a mut SampleRequest),
    /// The sink could not render what it was given
    MediaFailed(&'a str),
}

impl SinkEvent<'_> {
    /// Short name of the event, for logs
    pub fn event_type(&self) -> &'static str {
        match self {
            SinkEvent::Starting(_) => "starting",
            SinkEvent::SampleRequested(_) => "sample_requested",
            SinkEvent::MediaFailed(_) => "media_failed",
        }
    }

    /// Deliver the event to `target`
    pub fn dispatch<S: SourceCallbacks + ?Sized>(self, target: &mut S) {
        trace!(event = self.event_type(), "Dispatching sink event");
        match self {
            SinkEvent::Starting(request) => target.on_starting(request),
            SinkEvent::SampleRequested(request) => target.on_sample_requested(request),
            SinkEvent::MediaFailed(message) => target.on_media_failed(message),
        }
    }
}

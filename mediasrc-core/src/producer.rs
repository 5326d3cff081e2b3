//! The producer capability behind a stream source

use crate::descriptor::StreamDescriptor;
use crate::error::MediaResult;
use crate::request::SampleRequest;

/// Supplies samples for sample requests
///
/// `fill` must leave the request filled, marked end-of-stream, or deferred
/// before returning `Ok`. Timestamps must never decrease across fills.
pub trait Producer: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fill one request
    fn fill(&mut self, request: &mut SampleRequest) -> MediaResult<()>;

    /// Whether the producer has run out, including through deferred completions
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Creates and initializes the producer for one session
pub trait ProducerFactory {
    /// Name of the backing resource, for logs and open failures
    fn resource_name(&self) -> String;

    /// Instantiate and initialize a producer for `descriptor`
    fn open(&self, descriptor: &StreamDescriptor) -> MediaResult<Box<dyn Producer>>;
}

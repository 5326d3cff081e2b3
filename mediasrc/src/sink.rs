//! Pull-based rendering sink
//!
//! The sink plays the host's part: it raises the start event, then pulls
//! one sample at a time, waiting on deferred requests before it asks again.
//! "Rendering" here means checking what arrived and recording it.

use crate::event::SinkEvent;
use mediasrc_core::{
    MediaError, MediaResult, MediaSample, MediaTime, PendingSample, RequestCompletion,
    SampleOutcome, SourceCallbacks, StartingRequest, StreamSource,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sink settings
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Stop after this many sample requests
    pub max_pulls: Option<u64>,
    /// Give up on a deferred request after this long
    pub deferral_timeout: Option<Duration>,
    /// Stop after this many requests in a row come back unfulfilled
    pub max_unfulfilled_in_a_row: u32,
    /// Give up after this many deferred requests in a row fail recoverably
    pub max_failed_deferrals_in_a_row: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_pulls: None,
            deferral_timeout: None,
            max_unfulfilled_in_a_row: 5,
            max_failed_deferrals_in_a_row: 3,
        }
    }
}

/// Why playback stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEnd {
    /// The source signalled end-of-stream
    EndOfStream,
    /// `max_pulls` was reached
    PullLimit,
    /// The source kept leaving requests unfulfilled
    Stalled,
    /// The sink rejected a sample or a deferred request failed
    MediaFailed,
}

/// What a playback session rendered
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackReport {
    /// Start position declared by the source
    pub start_position: Option<MediaTime>,
    /// Sample requests issued
    pub pulls: u64,
    /// Samples accepted
    pub samples_rendered: u64,
    /// Payload bytes accepted
    pub bytes_rendered: u64,
    /// Presentation timestamps in render order
    pub timestamps: Vec<MediaTime>,
    /// Why playback stopped
    pub end: PlaybackEnd,
    /// Message reported to the source, if any
    pub failure: Option<String>,
}

impl PlaybackReport {
    fn new() -> Self {
        Self {
            start_position: None,
            pulls: 0,
            samples_rendered: 0,
            bytes_rendered: 0,
            timestamps: Vec::new(),
            end: PlaybackEnd::PullLimit,
            failure: None,
        }
    }

    /// Whether the source reached end-of-stream
    pub fn ended(&self) -> bool {
        self.end == PlaybackEnd::EndOfStream
    }

    /// First rendered presentation timestamp
    pub fn first_pts(&self) -> Option<MediaTime> {
        self.timestamps.first().copied()
    }

    /// Last rendered presentation timestamp
    pub fn last_pts(&self) -> Option<MediaTime> {
        self.timestamps.last().copied()
    }
}

/// Drives a stream source the way a media player element would
#[derive(Debug, Clone, Default)]
pub struct PullSink {
    config: SinkConfig,
}

impl PullSink {
    /// Create new sink
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    /// Sink configuration
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Play `stream` through `callbacks` until it ends, stalls, fails or hits the pull limit
    ///
    /// Requests are created from `stream`, so it must be the source the
    /// callbacks were configured with.
    pub async fn play<S>(&self, stream: &StreamSource, callbacks: &mut S) -> PlaybackReport
    where
        S: SourceCallbacks + ?Sized,
    {
        let mut report = PlaybackReport::new();

        let mut start = StartingRequest::new();
        SinkEvent::Starting(&mut start).dispatch(callbacks);
        report.start_position = start.actual_start_position();

        let mut unfulfilled = 0u32;
        let mut failed_deferrals = 0u32;
        loop {
            if let Some(max) = self.config.max_pulls {
                if report.pulls >= max {
                    report.end = PlaybackEnd::PullLimit;
                    break;
                }
            }

            report.pulls += 1;
            let mut request = stream.create_request();
            SinkEvent::SampleRequested(&mut request).dispatch(callbacks);

            let outcome = match request.into_completion() {
                RequestCompletion::Ready(outcome) => Ok(outcome),
                RequestCompletion::Deferred(pending) => self.wait_deferred(pending).await,
                RequestCompletion::Unfulfilled => {
                    unfulfilled += 1;
                    if unfulfilled >= self.config.max_unfulfilled_in_a_row {
                        warn!(unfulfilled, "Source keeps leaving requests unfulfilled; stopping");
                        report.end = PlaybackEnd::Stalled;
                        break;
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
            };
            unfulfilled = 0;

            match outcome {
                Ok(SampleOutcome::EndOfStream) => {
                    report.end = PlaybackEnd::EndOfStream;
                    break;
                }
                Ok(SampleOutcome::Sample(sample)) => {
                    failed_deferrals = 0;
                    if let Err(message) = check_sample(&sample, report.last_pts()) {
                        fail(&mut report, callbacks, message);
                        break;
                    }
                    report.samples_rendered += 1;
                    report.bytes_rendered += sample.data.len() as u64;
                    report.timestamps.push(sample.timestamp);
                }
                Err(e) => {
                    // Recoverable deferral failures are retried by the next pull.
                    let err = MediaError::fill_failure("deferred request", e);
                    failed_deferrals += 1;
                    if err.is_recoverable()
                        && failed_deferrals < self.config.max_failed_deferrals_in_a_row
                    {
                        warn!(error = %err, failed_deferrals, "Deferred request failed; requesting again");
                        continue;
                    }
                    fail(&mut report, callbacks, err.to_string());
                    break;
                }
            }
        }

        info!(
            pulls = report.pulls,
            samples = report.samples_rendered,
            end = ?report.end,
            "Playback finished"
        );
        report
    }

    async fn wait_deferred(&self, pending: PendingSample) -> MediaResult<SampleOutcome> {
        match self.config.deferral_timeout {
            None => pending.wait().await,
            Some(limit) => match tokio::time::timeout(limit, pending.wait()).await {
                Ok(result) => result,
                Err(_) => Err(MediaError::ResourceNotAvailable {
                    resource: format!("deferred sample after {:?}", limit),
                }),
            },
        }
    }
}

fn check_sample(sample: &MediaSample, last: Option<MediaTime>) -> Result<(), String> {
    if sample.data.is_empty() {
        return Err("received an empty sample".to_string());
    }
    if let Some(last) = last {
        if sample.timestamp < last {
            return Err(format!(
                "presentation time went backwards from {} to {}",
                last, sample.timestamp
            ));
        }
    }
    Ok(())
}

fn fail<S: SourceCallbacks + ?Sized>(report: &mut PlaybackReport, callbacks: &mut S, message: String) {
    debug!(error = %message, "Rejecting sample");
    SinkEvent::MediaFailed(&message).dispatch(callbacks);
    report.failure = Some(message);
    report.end = PlaybackEnd::MediaFailed;
}

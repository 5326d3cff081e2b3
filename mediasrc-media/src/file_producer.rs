//! MP4 file-backed producer

use crate::mp4::{Mp4SampleReader, VideoTrackInfo};
use mediasrc_core::{MediaError, MediaResult, Producer, SampleRequest};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// How the file producer completes sample requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Read the sample inside `fill`
    #[default]
    Synchronous,
    /// Defer the request and read on a blocking tokio task
    Deferred,
}

/// Serves the video samples of one MP4 file in decode order
pub struct Mp4Producer {
    path: PathBuf,
    reader: Arc<Mutex<Mp4SampleReader>>,
    track: VideoTrackInfo,
    mode: FillMode,
    runtime: Option<Handle>,
    exhausted: Arc<AtomicBool>,
    /// Read failure of a deferred request, reported by the next `fill`
    deferred_error: Arc<Mutex<Option<MediaError>>>,
}

impl Mp4Producer {
    /// Open and parse the container at `path`
    ///
    /// Deferred mode needs a tokio runtime on the calling thread; without
    /// one the producer reads synchronously.
    pub fn open(path: impl AsRef<Path>, mode: FillMode) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = Mp4SampleReader::open(&path)?;
        let track = reader.track().clone();

        let runtime = match mode {
            FillMode::Synchronous => None,
            FillMode::Deferred => {
                let handle = Handle::try_current().ok();
                if handle.is_none() {
                    warn!(
                        path = %path.display(),
                        "No tokio runtime available; deferred fill falls back to synchronous reads"
                    );
                }
                handle
            }
        };

        Ok(Self {
            path,
            reader: Arc::new(Mutex::new(reader)),
            track,
            mode,
            runtime,
            exhausted: Arc::new(AtomicBool::new(false)),
            deferred_error: Arc::new(Mutex::new(None)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn track(&self) -> &VideoTrackInfo {
        &self.track
    }

    pub fn fill_mode(&self) -> FillMode {
        self.mode
    }

    fn fill_now(&mut self, request: &mut SampleRequest) -> MediaResult<()> {
        match self.reader.lock().read_sample()? {
            Some(sample) => request.set_sample(sample),
            None => {
                self.exhausted.store(true, Ordering::Release);
                request.set_end_of_stream()
            }
        }
    }

    fn fill_deferred(&self, handle: &Handle, request: &mut SampleRequest) -> MediaResult<()> {
        if let Some(e) = self.deferred_error.lock().take() {
            return Err(e);
        }

        // End of stream is decided here so the adapter sees it when `fill` returns.
        if !self.reader.lock().has_next_sample() {
            self.exhausted.store(true, Ordering::Release);
            return request.set_end_of_stream();
        }

        let deferral = request.defer()?;
        let reader = self.reader.clone();
        let failed = self.deferred_error.clone();

        handle.spawn_blocking(move || match reader.lock().read_sample() {
            Ok(Some(sample)) => deferral.complete(sample),
            Ok(None) => deferral.end_of_stream(),
            Err(e) => {
                warn!(error = %e, "Deferred sample read failed");
                *failed.lock() = Some(copy_read_error(&e));
                deferral.fail(e);
            }
        });

        debug!("Sample request deferred");
        Ok(())
    }
}

/// Reader errors are I/O or container errors; the copy keeps the I/O kind
fn copy_read_error(e: &MediaError) -> MediaError {
    match e {
        MediaError::Io { source } => std::io::Error::new(source.kind(), source.to_string()).into(),
        other => MediaError::InvalidContainer {
            reason: other.to_string(),
        },
    }
}

impl Producer for Mp4Producer {
    fn name(&self) -> &str {
        "mp4"
    }

    fn fill(&mut self, request: &mut SampleRequest) -> MediaResult<()> {
        match self.runtime.clone() {
            Some(handle) => self.fill_deferred(&handle, request),
            None => self.fill_now(request),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Mp4Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4Producer")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("track", &self.track)
            .finish()
    }
}

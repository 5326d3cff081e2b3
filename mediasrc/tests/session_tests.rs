//! End-to-end tests: player page, pull sink and adapter together

use bytes::Bytes;
use mediasrc::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn temp_asset_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mediasrc-session-{}-{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_clip(dir: &Path, file: &str, seconds: u32, fps: u32) {
    let mut writer = Mp4Writer::new(*b"avc1", 640, 480, fps);
    for i in 0..seconds * fps {
        writer.push_sample(&[(i % 200) as u8 + 1; 32], 1, i % fps == 0);
    }
    writer.write_to(dir.join(file)).unwrap();
}

/// Producer that hands out whatever the test scripted
struct Script {
    samples: Vec<MediaSample>,
    held: Vec<SampleDeferral>,
    defer: bool,
    /// Defer and drop this many requests before serving samples
    drop_deferrals: u32,
}

impl Producer for Script {
    fn name(&self) -> &str {
        "script"
    }

    fn fill(&mut self, request: &mut SampleRequest) -> MediaResult<()> {
        if self.drop_deferrals > 0 {
            self.drop_deferrals -= 1;
            drop(request.defer()?);
            return Ok(());
        }
        if self.defer {
            self.held.push(request.defer()?);
            return Ok(());
        }
        if self.samples.is_empty() {
            return request.set_end_of_stream();
        }
        request.set_sample(self.samples.remove(0))
    }
}

struct ScriptFactory {
    samples: Vec<MediaSample>,
    defer: bool,
    drop_deferrals: u32,
}

impl ProducerFactory for ScriptFactory {
    fn resource_name(&self) -> String {
        "script".to_string()
    }

    fn open(&self, _descriptor: &StreamDescriptor) -> MediaResult<Box<dyn Producer>> {
        Ok(Box::new(Script {
            samples: self.samples.clone(),
            held: Vec::new(),
            defer: self.defer,
            drop_deferrals: self.drop_deferrals,
        }))
    }
}

fn sample(ts: i64, data: &'static [u8]) -> MediaSample {
    MediaSample {
        data: Bytes::from_static(data),
        timestamp: MediaTime::new(ts, 30),
        duration: MediaTime::new(1, 30),
        is_keyframe: true,
    }
}

fn scripted(samples: Vec<MediaSample>) -> (StreamSource, StreamSourceAdapter<ScriptFactory>) {
    let source = configure(DescriptorKind::SyntheticRaw, &SourceParameters::default()).unwrap();
    let adapter = StreamSourceAdapter::new(
        source.clone(),
        ScriptFactory {
            samples,
            defer: false,
            drop_deferrals: 0,
        },
    );
    (source, adapter)
}

// ============================================================================
// PLAYER PAGE TESTS
// ============================================================================

#[tokio::test]
async fn test_synthetic_page_plays_and_previews() {
    let config = PlayerConfig {
        max_pulls: Some(90),
        ..Default::default()
    };
    let mut page = PlayerPage::new(config).unwrap();
    let report = page.on_navigated_to().await.unwrap();

    assert_eq!(report.playback.start_position, Some(MediaTime::ZERO));
    assert_eq!(report.playback.samples_rendered, 90);
    assert_eq!(report.playback.end, PlaybackEnd::PullLimit);
    assert_eq!(report.playback.first_pts(), Some(MediaTime::ZERO));
    assert_eq!(report.playback.last_pts(), Some(MediaTime::new(89, 30)));
    assert_eq!(report.playback.bytes_rendered, 90 * 640 * 480 * 4);
    assert_eq!(report.session_state, SessionState::Running);
    assert_eq!(report.preview_state, Some(PreviewState::Previewing));
    assert!(report.preview_error.is_none());

    page.on_navigated_from().await;
    assert_eq!(page.preview().unwrap().state(), PreviewState::Stopped);
}

#[tokio::test]
async fn test_failing_preview_does_not_affect_playback() {
    let config = PlayerConfig {
        max_pulls: Some(10),
        ..Default::default()
    };
    let mut page = PlayerPage::new(config)
        .unwrap()
        .with_capture_backend(Box::new(
            MockCaptureBackend::new()
                .with_init_delay(Duration::from_millis(5))
                .failing_initialize(),
        ));
    let report = page.on_navigated_to().await.unwrap();

    assert_eq!(report.playback.samples_rendered, 10);
    assert_eq!(report.session_state, SessionState::Running);
    assert_eq!(report.preview_state, Some(PreviewState::Failed));
    assert!(report.preview_error.is_some());
}

#[tokio::test]
async fn test_file_page_plays_to_end_of_stream() {
    let dir = temp_asset_dir("file");
    write_clip(&dir, "clip.mp4", 10, 30);

    for fill_mode in [FillMode::Synchronous, FillMode::Deferred] {
        let config = PlayerConfig {
            mode: PlaybackMode::File,
            asset_dir: dir.clone(),
            media_file: PathBuf::from("clip.mp4"),
            fill_mode,
            max_pulls: None,
            enable_camera_preview: false,
            ..Default::default()
        };
        let mut page = PlayerPage::new(config).unwrap();
        let report = page.on_navigated_to().await.unwrap();

        assert!(report.playback.ended(), "{:?} did not end", fill_mode);
        assert_eq!(report.session_state, SessionState::Ended, "{:?}", fill_mode);
        assert_eq!(report.playback.samples_rendered, 300);
        assert_eq!(report.playback.pulls, 301);
        assert_eq!(report.playback.last_pts(), Some(MediaTime::new(299, 30)));
        assert!(report.preview_state.is_none());
    }

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_missing_media_file_faults_without_panicking() {
    let config = PlayerConfig {
        mode: PlaybackMode::File,
        asset_dir: PathBuf::from("/nonexistent/Assets"),
        enable_camera_preview: false,
        ..Default::default()
    };
    let mut page = PlayerPage::new(config).unwrap();
    let report = page.on_navigated_to().await.unwrap();

    assert_eq!(report.session_state, SessionState::Faulted);
    assert_eq!(report.playback.samples_rendered, 0);
    assert_eq!(report.playback.end, PlaybackEnd::Stalled);
    assert_eq!(report.playback.start_position, Some(MediaTime::ZERO));
    assert!(report.adapter_error.unwrap().contains("big_buck_bunny.mp4"));
}

#[test]
fn test_invalid_config_rejected_by_page() {
    let config = PlayerConfig {
        width: 0,
        ..Default::default()
    };
    assert!(matches!(
        PlayerPage::new(config),
        Err(PlayerError::InvalidConfiguration { .. })
    ));
}

// ============================================================================
// SINK TESTS
// ============================================================================

#[tokio::test]
async fn test_backwards_timestamp_reported_as_media_failure() {
    let (source, mut adapter) = scripted(vec![sample(0, b"a"), sample(2, b"b"), sample(1, b"c")]);
    let report = PullSink::default().play(&source, &mut adapter).await;

    assert_eq!(report.end, PlaybackEnd::MediaFailed);
    assert_eq!(report.samples_rendered, 2);
    assert!(report.failure.unwrap().contains("backwards"));
    assert_eq!(adapter.stats().sink_failures, 1);
    assert!(matches!(
        adapter.last_error(),
        Some(MediaError::SinkMediaFailure { .. })
    ));
    // A sink failure is recorded, not acted on.
    assert_eq!(adapter.state(), SessionState::Running);
}

#[tokio::test]
async fn test_empty_sample_reported_as_media_failure() {
    let (source, mut adapter) = scripted(vec![sample(0, b"")]);
    let report = PullSink::default().play(&source, &mut adapter).await;

    assert_eq!(report.end, PlaybackEnd::MediaFailed);
    assert_eq!(report.samples_rendered, 0);
    assert_eq!(adapter.stats().sink_failures, 1);
}

#[tokio::test]
async fn test_equal_timestamps_accepted() {
    let (source, mut adapter) = scripted(vec![sample(3, b"a"), sample(3, b"b")]);
    let report = PullSink::default().play(&source, &mut adapter).await;

    assert!(report.ended());
    assert_eq!(report.samples_rendered, 2);
}

#[tokio::test]
async fn test_deferral_timeout() {
    let source = configure(DescriptorKind::SyntheticRaw, &SourceParameters::default()).unwrap();
    let mut adapter = StreamSourceAdapter::new(
        source.clone(),
        ScriptFactory {
            samples: Vec::new(),
            defer: true,
            drop_deferrals: 0,
        },
    );
    let sink = PullSink::new(SinkConfig {
        deferral_timeout: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let report = sink.play(&source, &mut adapter).await;

    // A timeout is recoverable, so the sink asks again before giving up.
    assert_eq!(report.end, PlaybackEnd::MediaFailed);
    assert_eq!(report.pulls, 3);
    assert_eq!(adapter.stats().deferred, 3);
    assert!(report.failure.unwrap().contains("Sample fill failed"));
}

fn dropping(
    samples: Vec<MediaSample>,
    drop_deferrals: u32,
) -> (StreamSource, StreamSourceAdapter<ScriptFactory>) {
    let source = configure(DescriptorKind::SyntheticRaw, &SourceParameters::default()).unwrap();
    let adapter = StreamSourceAdapter::new(
        source.clone(),
        ScriptFactory {
            samples,
            defer: false,
            drop_deferrals,
        },
    );
    (source, adapter)
}

#[tokio::test]
async fn test_dropped_deferral_retried() {
    let (source, mut adapter) = dropping(vec![sample(0, b"a"), sample(1, b"b")], 2);
    let report = PullSink::default().play(&source, &mut adapter).await;

    assert!(report.ended());
    assert_eq!(report.samples_rendered, 2);
    assert_eq!(report.pulls, 5);
    assert!(report.failure.is_none());
    assert_eq!(adapter.stats().sink_failures, 0);
    assert_eq!(adapter.state(), SessionState::Ended);
}

#[tokio::test]
async fn test_repeatedly_dropped_deferrals_fail_playback() {
    let (source, mut adapter) = dropping(vec![sample(0, b"a")], u32::MAX);
    let report = PullSink::default().play(&source, &mut adapter).await;

    assert_eq!(report.end, PlaybackEnd::MediaFailed);
    assert_eq!(report.pulls, 3);
    assert!(report.failure.unwrap().contains("dropped"));
    assert_eq!(adapter.stats().sink_failures, 1);
}

#[test]
fn test_sink_event_names() {
    let mut start = StartingRequest::new();
    assert_eq!(SinkEvent::Starting(&mut start).event_type(), "starting");
    assert_eq!(SinkEvent::MediaFailed("boom").event_type(), "media_failed");
}

#[test]
fn test_report_serializes() {
    let (source, mut adapter) = scripted(vec![sample(0, b"a")]);
    let report = tokio_test::block_on(PullSink::default().play(&source, &mut adapter));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["end"], "end_of_stream");
    assert_eq!(json["samples_rendered"], 1);
}

//! Tests for the MP4 reader and the file-backed producer
//!
//! Fixture files are written with [`Mp4Writer`] into the system temp
//! directory; every test uses its own file name.

use mediasrc_core::*;
use mediasrc_media::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mediasrc-{}-{}.mp4", std::process::id(), name))
}

/// `seconds` of fake H.264 at `fps`, timescale = fps, keyframe every 30 samples
fn write_clip(name: &str, seconds: u32, fps: u32) -> PathBuf {
    let mut writer = Mp4Writer::new(*b"avc1", 320, 240, fps);
    for i in 0..seconds * fps {
        let payload = [(i % 251) as u8; 24];
        writer.push_sample(&payload, 1, i % 30 == 0);
    }
    let path = fixture_path(name);
    writer.write_to(&path).unwrap();
    path
}

fn file_source(path: &Path) -> StreamSource {
    let params = SourceParameters {
        path: Some(path.to_path_buf()),
        ..Default::default()
    };
    configure(DescriptorKind::FileVideo, &params).unwrap()
}

fn started(path: &Path, fill_mode: FillMode) -> StreamSourceAdapter<MediaProducerFactory> {
    let mut adapter = StreamSourceAdapter::new(
        file_source(path),
        MediaProducerFactory::file(path, fill_mode),
    );
    let mut start = StartingRequest::new();
    adapter.on_starting(&mut start);
    assert_eq!(start.actual_start_position(), Some(MediaTime::ZERO));
    adapter
}

// ============================================================================
// READER TESTS
// ============================================================================

#[test]
fn test_probe_reports_track() {
    let path = write_clip("probe", 2, 30);
    let track = Mp4SampleReader::probe(&path).unwrap();

    assert_eq!(track.subtype, VideoSubtype::H264);
    assert_eq!((track.width, track.height), (320, 240));
    assert_eq!(track.sample_count, 60);
    assert_eq!(track.frame_rate, FrameRate::fps(30));
    assert_eq!(track.duration, MediaTime::new(2, 1));

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_presentation_time_never_decreases() {
    // B-frame style reordering with a composition offset that would go backwards.
    let mut writer = Mp4Writer::new(*b"avc1", 16, 16, 30);
    writer.push_sample_with_offset(&[1; 8], 1, 2, true);
    writer.push_sample_with_offset(&[2; 8], 1, -1, false);
    writer.push_sample_with_offset(&[3; 8], 1, 0, false);
    writer.push_sample_with_offset(&[4; 8], 1, 2, false);
    let bytes = writer.finish().unwrap();

    let mut reader = Mp4SampleReader::from_reader(Cursor::new(bytes)).unwrap();
    let mut stamps = Vec::new();
    while let Some(sample) = reader.read_sample().unwrap() {
        stamps.push(sample.timestamp.value());
    }

    // Raw PTS would be 2, 0, 2, 5.
    assert_eq!(stamps, vec![2, 2, 2, 5]);
}

#[test]
fn test_missing_moov_is_invalid() {
    let mut data = Vec::new();
    data.extend_from_slice(&16u32.to_be_bytes());
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&0u32.to_be_bytes());

    let err = Mp4SampleReader::from_reader(Cursor::new(data)).unwrap_err();
    assert!(matches!(err, MediaError::InvalidContainer { .. }));
}

#[test]
fn test_truncated_file_is_invalid() {
    let mut writer = Mp4Writer::new(*b"avc1", 16, 16, 30);
    writer.push_sample(&[0; 64], 1, true);
    let mut bytes = writer.finish().unwrap();
    bytes.truncate(bytes.len() - 20);

    assert!(Mp4SampleReader::from_reader(Cursor::new(bytes)).is_err());
}

fn patch_u32_after(bytes: &mut [u8], fourcc: &[u8; 4], skip: usize, value: u32) {
    let at = bytes
        .windows(4)
        .position(|w| w == fourcc)
        .expect("box present")
        + 4
        + skip;
    bytes[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

fn small_clip() -> Vec<u8> {
    let mut writer = Mp4Writer::new(*b"avc1", 16, 16, 30);
    for i in 0..30u8 {
        writer.push_sample(&[i; 16], 1, i == 0);
    }
    writer.finish().unwrap()
}

#[test]
fn test_uniform_sample_count_larger_than_file() {
    let mut bytes = small_clip();
    // stsz: version/flags, uniform size, sample count
    patch_u32_after(&mut bytes, b"stsz", 4, 1);
    patch_u32_after(&mut bytes, b"stsz", 8, u32::MAX);

    let err = Mp4SampleReader::from_reader(Cursor::new(bytes.clone())).unwrap_err();
    assert!(matches!(err, MediaError::InvalidContainer { .. }));

    let path = fixture_path("huge-stsz");
    std::fs::write(&path, &bytes).unwrap();
    let source = file_source(&path);
    assert_eq!(
        source.descriptor().video_encoding().unwrap().subtype,
        VideoSubtype::H264
    );
    let adapter = started(&path, FillMode::Synchronous);
    assert_eq!(adapter.state(), SessionState::Faulted);

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_chunk_offset_past_end_of_file() {
    let mut bytes = small_clip();
    // stco: version/flags, entry count, first chunk offset
    let len = bytes.len() as u32;
    patch_u32_after(&mut bytes, b"stco", 8, len - 8);

    let err = Mp4SampleReader::from_reader(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, MediaError::InvalidContainer { .. }));
}

#[test]
fn test_rewind() {
    let path = write_clip("rewind", 1, 10);
    let mut reader = Mp4SampleReader::open(&path).unwrap();
    while reader.read_sample().unwrap().is_some() {}
    assert_eq!(reader.remaining(), 0);

    reader.rewind();
    let first = reader.read_sample().unwrap().unwrap();
    assert_eq!(first.timestamp, MediaTime::ZERO);
    assert!(first.is_keyframe);

    let _ = std::fs::remove_file(path);
}

// ============================================================================
// FILE PRODUCER TESTS
// ============================================================================

#[test]
fn test_ten_second_clip_fills_then_ends() {
    let path = write_clip("ten-seconds", 10, 30);
    let mut adapter = started(&path, FillMode::Synchronous);
    assert_eq!(adapter.state(), SessionState::Running);

    let mut last = None;
    for i in 0..300 {
        let mut request = adapter.source().create_request();
        adapter.on_sample_requested(&mut request);
        match request.into_completion() {
            RequestCompletion::Ready(SampleOutcome::Sample(sample)) => {
                if let Some(prev) = last {
                    assert!(sample.timestamp >= prev, "timestamp went back at fill {}", i);
                }
                last = Some(sample.timestamp);
            }
            other => panic!("Fill {} should hold a sample, got {:?}", i + 1, other),
        }
    }

    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    assert!(matches!(
        request.into_completion(),
        RequestCompletion::Ready(SampleOutcome::EndOfStream)
    ));
    assert_eq!(adapter.state(), SessionState::Ended);
    assert_eq!(adapter.stats().samples_delivered, 300);
    assert_eq!(last, Some(MediaTime::new(299, 30)));

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_nonexistent_file_never_runs() {
    let path = PathBuf::from("/nonexistent/Assets/big_buck_bunny.mp4");
    let mut adapter = started(&path, FillMode::Synchronous);

    assert_eq!(adapter.state(), SessionState::Faulted);
    assert!(matches!(
        adapter.last_error(),
        Some(MediaError::ResourceOpenFailure { .. })
    ));

    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    assert_eq!(request.status(), RequestStatus::Empty);
    assert_eq!(adapter.state(), SessionState::Faulted);
}

#[test]
fn test_garbage_file_is_open_failure() {
    let path = fixture_path("garbage");
    std::fs::write(&path, b"definitely not an iso media file").unwrap();

    let adapter = started(&path, FillMode::Synchronous);
    assert_eq!(adapter.state(), SessionState::Faulted);
    assert_eq!(
        adapter.last_error().map(|e| e.category()),
        Some(ErrorCategory::ResourceOpen)
    );

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_deferred_fill_matches_synchronous() {
    let path = write_clip("deferred", 1, 30);

    let mut sync_adapter = started(&path, FillMode::Synchronous);
    let mut expected = Vec::new();
    loop {
        let mut request = sync_adapter.source().create_request();
        sync_adapter.on_sample_requested(&mut request);
        match request.into_completion() {
            RequestCompletion::Ready(SampleOutcome::Sample(s)) => expected.push(s),
            RequestCompletion::Ready(SampleOutcome::EndOfStream) => break,
            other => panic!("Unexpected completion {:?}", other),
        }
    }

    let mut deferred_adapter = started(&path, FillMode::Deferred);
    let mut actual = Vec::new();
    loop {
        let mut request = deferred_adapter.source().create_request();
        deferred_adapter.on_sample_requested(&mut request);
        let outcome = match request.into_completion() {
            RequestCompletion::Deferred(pending) => pending.wait().await.unwrap(),
            RequestCompletion::Ready(outcome) => outcome,
            RequestCompletion::Unfulfilled => panic!("Request left unfulfilled"),
        };
        match outcome {
            SampleOutcome::Sample(s) => actual.push(s),
            SampleOutcome::EndOfStream => break,
        }
    }
    assert_eq!(deferred_adapter.state(), SessionState::Ended);

    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_eq!(a.timestamp, e.timestamp);
        assert_eq!(a.data, e.data);
        assert_eq!(a.is_keyframe, e.is_keyframe);
    }
    // End of stream is answered without deferring.
    assert_eq!(deferred_adapter.stats().deferred, 30);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_deferred_read_failure_reported_on_next_fill() {
    let path = write_clip("deferred-truncated", 1, 30);
    let mut adapter = started(&path, FillMode::Deferred);
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(0)
        .unwrap();

    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    let pending = match request.into_completion() {
        RequestCompletion::Deferred(pending) => pending,
        other => panic!("Expected a deferred completion, got {:?}", other),
    };
    assert!(pending.wait().await.is_err());
    assert_eq!(adapter.state(), SessionState::Running);

    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    assert_eq!(request.status(), RequestStatus::Empty);
    assert_eq!(adapter.stats().fill_failures, 1);
    assert_eq!(adapter.state(), SessionState::Faulted);
    assert_eq!(
        adapter.last_error().map(|e| e.category()),
        Some(ErrorCategory::SampleFill)
    );

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_deferred_without_runtime_reads_synchronously() {
    let path = write_clip("deferred-no-runtime", 1, 5);
    let mut adapter = started(&path, FillMode::Deferred);

    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    assert_eq!(request.status(), RequestStatus::Filled);

    let _ = std::fs::remove_file(path);
}

// ============================================================================
// CONFIGURE TESTS
// ============================================================================

#[test]
fn test_configure_reads_codec_from_container() {
    let mut writer = Mp4Writer::new(*b"hvc1", 1280, 720, 25);
    writer.push_sample(&[0; 4], 1, true);
    let path = fixture_path("hevc");
    writer.write_to(&path).unwrap();

    let source = file_source(&path);
    let enc = source.descriptor().video_encoding().unwrap();
    assert_eq!(enc.subtype, VideoSubtype::Hevc);
    assert_eq!((enc.width, enc.height), (1280, 720));
    assert_eq!(enc.frame_rate, FrameRate::fps(30));
    assert_eq!(enc.bitrate, None);

    let _ = std::fs::remove_file(path);
}

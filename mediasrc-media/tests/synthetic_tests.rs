//! Tests for the synthetic producer behind a stream source adapter

use mediasrc_core::*;
use mediasrc_media::*;

fn synthetic_source(width: u32, height: u32, fps: FrameRate) -> StreamSource {
    let params = SourceParameters {
        width,
        height,
        frame_rate: fps,
        ..Default::default()
    };
    configure(DescriptorKind::SyntheticRaw, &params).unwrap()
}

fn pull(adapter: &mut StreamSourceAdapter<MediaProducerFactory>) -> RequestCompletion {
    let mut request = adapter.source().create_request();
    adapter.on_sample_requested(&mut request);
    request.into_completion()
}

fn pull_sample(adapter: &mut StreamSourceAdapter<MediaProducerFactory>) -> MediaSample {
    match pull(adapter) {
        RequestCompletion::Ready(SampleOutcome::Sample(sample)) => sample,
        other => panic!("Expected a sample, got {:?}", other),
    }
}

// ============================================================================
// CONFIGURATION TESTS
// ============================================================================

#[test]
fn test_bitrate_matches_geometry() {
    for (w, h, fps) in [(640, 480, 30), (320, 240, 25), (1920, 1080, 60), (2, 2, 1)] {
        let source = synthetic_source(w, h, FrameRate::fps(fps));
        let enc = source.descriptor().video_encoding().unwrap();
        assert_eq!(enc.bitrate, Some(fps as u64 * w as u64 * h as u64 * 4));
        assert_eq!(enc.subtype, VideoSubtype::Bgra8);
    }
}

#[test]
fn test_zero_geometry_rejected() {
    let params = SourceParameters {
        width: 0,
        ..Default::default()
    };
    assert!(configure(DescriptorKind::SyntheticRaw, &params).is_err());
}

// ============================================================================
// PLAYBACK TESTS
// ============================================================================

#[test]
fn test_start_position_is_zero() {
    let mut adapter = StreamSourceAdapter::new(
        synthetic_source(64, 48, FrameRate::fps(30)),
        MediaProducerFactory::synthetic(),
    );
    let mut start = StartingRequest::new();
    adapter.on_starting(&mut start);

    assert_eq!(start.actual_start_position(), Some(MediaTime::ZERO));
    assert_eq!(adapter.state(), SessionState::Running);
}

#[test]
fn test_timestamps_spaced_by_frame_duration() {
    let fps = FrameRate::new(30000, 1001);
    let mut adapter =
        StreamSourceAdapter::new(synthetic_source(32, 32, fps), MediaProducerFactory::synthetic());
    adapter.on_starting(&mut StartingRequest::new());

    let samples: Vec<MediaSample> = (0..120).map(|_| pull_sample(&mut adapter)).collect();

    assert_eq!(samples[0].timestamp, MediaTime::ZERO);
    for (i, pair) in samples.windows(2).enumerate() {
        let spacing = pair[1]
            .timestamp
            .checked_add(MediaTime::new(-pair[0].timestamp.value(), pair[0].timestamp.timescale()))
            .unwrap();
        assert_eq!(spacing, fps.frame_duration(), "spacing after frame {}", i);
        assert!(pair[1].timestamp > pair[0].timestamp);
    }
    assert_eq!(samples[119].timestamp, MediaTime::new(119 * 1001, 30000));
    assert_eq!(adapter.stats().samples_delivered, 120);
}

#[test]
fn test_frames_have_canvas_size_and_moving_square() {
    let mut adapter = StreamSourceAdapter::new(
        synthetic_source(64, 48, FrameRate::fps(30)),
        MediaProducerFactory::synthetic(),
    );
    adapter.on_starting(&mut StartingRequest::new());

    let first = pull_sample(&mut adapter);
    let second = pull_sample(&mut adapter);
    assert_eq!(first.data.len(), 64 * 48 * 4);
    assert_eq!(&first.data[0..4], &[0xA4, 0xA4, 0x12, 0xFF]);
    assert_eq!(&second.data[0..4], &[0, 0, 0, 0]);
    assert_eq!(&second.data[40..44], &[0xA4, 0xA4, 0x12, 0xFF]);
}

#[test]
fn test_frame_limit_ends_session() {
    let mut adapter = StreamSourceAdapter::new(
        synthetic_source(16, 16, FrameRate::fps(30)),
        MediaProducerFactory::new(ProducerKind::Synthetic {
            frame_limit: Some(3),
        }),
    );
    adapter.on_starting(&mut StartingRequest::new());

    for _ in 0..3 {
        pull_sample(&mut adapter);
    }
    assert!(matches!(
        pull(&mut adapter),
        RequestCompletion::Ready(SampleOutcome::EndOfStream)
    ));
    assert_eq!(adapter.state(), SessionState::Ended);
    assert!(matches!(pull(&mut adapter), RequestCompletion::Unfulfilled));
}

#[test]
fn test_audio_request_ignored() {
    let mut adapter = StreamSourceAdapter::new(
        synthetic_source(16, 16, FrameRate::fps(30)),
        MediaProducerFactory::synthetic(),
    );
    adapter.on_starting(&mut StartingRequest::new());

    let audio = std::sync::Arc::new(StreamDescriptor::audio(AudioEncoding {
        sample_rate: 44100,
        channels: 2,
        bits_per_sample: 16,
    }));
    let mut request = SampleRequest::new(audio);
    adapter.on_sample_requested(&mut request);

    assert_eq!(request.status(), RequestStatus::Empty);
    assert_eq!(adapter.stats().ignored, 1);
    // The ignored request did not consume a frame.
    assert_eq!(pull_sample(&mut adapter).timestamp, MediaTime::ZERO);
}

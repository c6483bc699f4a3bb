mod common;

use std::time::Duration;

use facecap_core::detection::face_detector::{DetectorConfig, FaceDetector};
use facecap_core::pipeline::capture_config::CaptureConfig;
use facecap_core::pipeline::infrastructure::threaded_pipeline::PipelineMessage;
use facecap_core::pipeline::pipeline_controller::PipelineController;
use facecap_core::pipeline::pipeline_error::PipelineError;
use facecap_core::pipeline::pipeline_state::PipelineState;
use facecap_core::shared::pixel_format::PixelFormat;
use facecap_core::video::infrastructure::ffmpeg_source::FfmpegRuntime;
use tempfile::TempDir;

use common::create_test_video;

fn controller(queue: usize) -> PipelineController {
    let config = CaptureConfig {
        frame_queue_capacity: queue,
        ..CaptureConfig::default()
    };
    PipelineController::new(Box::new(FfmpegRuntime::new()), config)
}

#[test]
fn test_file_source_plays_to_end_of_stream() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("clip.mp4");
    create_test_video(&path, 5, 160, 120, 30);

    let mut controller = controller(16);
    let frames = controller.subscribe_frames();
    let messages = controller.messages();
    controller.set_source(path.to_str().unwrap()).unwrap();
    controller.start().unwrap();
    assert!(controller.is_running());
    assert_eq!(controller.state(), PipelineState::Playing);

    loop {
        match messages.recv_timeout(Duration::from_secs(10)).unwrap() {
            PipelineMessage::EndOfStream => break,
            PipelineMessage::Error(e) => panic!("pipeline error: {e}"),
            PipelineMessage::StateChanged { .. } => {}
        }
    }
    controller.stop();

    let received: Vec<_> = frames.try_iter().collect();
    assert_eq!(received.len(), 5);
    for (i, frame) in received.iter().enumerate() {
        assert_eq!(frame.sequence(), i as u64);
        assert_eq!((frame.width(), frame.height()), (160, 120));
        assert_eq!(frame.format(), PixelFormat::Rgb24);
    }
    assert_eq!(controller.dropped_frames(), 0);
}

#[test]
fn test_state_changes_are_posted_in_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("clip.mp4");
    create_test_video(&path, 2, 64, 48, 30);

    let mut controller = controller(4);
    let messages = controller.messages();
    controller.set_source(path.to_str().unwrap()).unwrap();
    controller.start().unwrap();
    controller.stop();

    let steps: Vec<(PipelineState, PipelineState)> = messages
        .try_iter()
        .filter_map(|m| match m {
            PipelineMessage::StateChanged { old, new } => Some((old, new)),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        vec![
            (PipelineState::Null, PipelineState::Ready),
            (PipelineState::Ready, PipelineState::Paused),
            (PipelineState::Paused, PipelineState::Playing),
            (PipelineState::Playing, PipelineState::Paused),
            (PipelineState::Paused, PipelineState::Ready),
            (PipelineState::Ready, PipelineState::Null),
        ]
    );
}

#[test]
fn test_missing_file_fails_to_start() {
    let mut controller = controller(4);
    controller.set_source("/nonexistent/clip.mp4").unwrap();

    let err = controller.start().unwrap_err();

    assert!(matches!(err, PipelineError::StateChange { .. }), "{err}");
    assert!(!controller.is_running());
    assert_eq!(controller.state(), PipelineState::Null);
}

#[test]
fn test_decoded_frames_feed_the_detector() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("clip.mp4");
    create_test_video(&path, 3, 96, 72, 30);
    let config = DetectorConfig {
        search_dirs: vec![tmp.path().to_path_buf()],
        output_dir: tmp.path().join("faces"),
        ..DetectorConfig::default()
    };
    std::fs::write(tmp.path().join(&config.cascade_name), common::BAND_CASCADE_XML).unwrap();
    let mut detector = FaceDetector::new(&config);
    let counts = detector.subscribe_counts();

    let mut controller = controller(8);
    let frames = controller.subscribe_frames();
    controller.set_source(path.to_str().unwrap()).unwrap();
    controller.start().unwrap();
    for _ in 0..3 {
        let frame = frames.recv_timeout(Duration::from_secs(10)).unwrap();
        let detection = detector.process_frame(frame);
        assert_eq!(detection.saved.len(), detection.faces.len());
        assert_eq!(detection.annotated.format(), PixelFormat::Rgb24);
    }
    controller.stop();

    assert_eq!(counts.try_iter().count(), 3);
}

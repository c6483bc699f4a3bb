use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};

use facecap_core::detection::face_detector::{FaceDetector, FacesDetected};
use facecap_core::pipeline::infrastructure::threaded_pipeline::PipelineMessage;
use facecap_core::pipeline::pipeline_controller::PipelineController;
use facecap_core::pipeline::session_logger::SessionLogger;
use facecap_core::shared::frame::Frame;
use facecap_core::shared::rect::Rect;
use facecap_core::video::infrastructure::image_file_writer::ImageFileWriter;

use crate::display::FrameDisplay;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Stop after this many processed frames.
    pub max_frames: Option<u64>,
    /// Write the last rendered frame here when the session ends.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfStream,
    FrameLimit,
    Interrupted,
}

/// How the detection thread should wind down.
enum DetectCommand {
    /// Process the frames already queued, then exit.
    Finish,
    /// Exit without touching queued frames.
    Abort,
}

/// Outcome of one frame on the detection thread.
struct DetectReport {
    faces: Vec<Rect>,
    elapsed: Duration,
}

/// Ties the capture pipeline to its two frame subscribers.
///
/// The face detector runs on its own thread with its own frame queue. The
/// display is fed from a second queue on the thread that calls
/// [`Session::run`], so slow detection never holds frames back from the
/// view. Detection results come back as outlines for the display and as
/// count events.
pub struct Session {
    controller: PipelineController,
    detector: Option<FaceDetector>,
    display: FrameDisplay,
    logger: Box<dyn SessionLogger>,
    options: SessionOptions,
    processed: u64,
}

impl Session {
    pub fn new(
        controller: PipelineController,
        detector: FaceDetector,
        logger: Box<dyn SessionLogger>,
        options: SessionOptions,
    ) -> Self {
        Self {
            controller,
            detector: Some(detector),
            display: FrameDisplay::new(),
            logger,
            options,
            processed: 0,
        }
    }

    /// Starts capture and processes frames until end of stream, the frame
    /// limit, or a message on `interrupt`. The pipeline is always stopped
    /// and the detection thread joined before this returns.
    pub fn run(&mut self, interrupt: &Receiver<()>) -> Result<SessionEnd, Box<dyn std::error::Error>> {
        if self.limit_reached() {
            return Ok(SessionEnd::FrameLimit);
        }
        let detector = self.detector.take().ok_or("session already ran")?;
        let counts = detector.subscribe_counts();
        let detector_frames = self.controller.subscribe_frames();
        let display_frames = self.controller.subscribe_frames();
        let messages = self.controller.messages();

        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let remaining = self.options.max_frames.map(|max| max - self.processed);
        let handle = spawn_detector(detector, detector_frames, command_rx, report_tx, remaining)?;

        let outcome = match self.controller.start() {
            Ok(()) => {
                self.logger.info("Capture started");
                self.pump(&display_frames, &report_rx, &counts, &messages, &command_tx, interrupt)
            }
            Err(e) => Err(e.into()),
        };
        self.controller.stop();
        let _ = command_tx.send(DetectCommand::Abort);
        match handle.join() {
            Ok(detector) => self.detector = Some(detector),
            Err(_) => log::error!("Detection thread panicked"),
        }
        for report in report_rx.try_iter() {
            self.on_report(report);
        }

        for event in counts.try_iter() {
            self.on_count(event);
        }
        self.logger
            .metric("dropped_frames", self.controller.dropped_frames() as f64);
        self.logger.summary();

        if let Some(path) = &self.options.snapshot {
            match self.display.snapshot(path, &ImageFileWriter::new()) {
                Ok(()) => log::info!("Snapshot written to {}", path.display()),
                Err(e) => log::warn!("No snapshot written: {e}"),
            }
        }
        self.display.clear();

        outcome
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn display(&self) -> &FrameDisplay {
        &self.display
    }

    fn pump(
        &mut self,
        frames: &Receiver<Arc<Frame>>,
        reports: &Receiver<DetectReport>,
        counts: &Receiver<FacesDetected>,
        messages: &Receiver<PipelineMessage>,
        commands: &Sender<DetectCommand>,
        interrupt: &Receiver<()>,
    ) -> Result<SessionEnd, Box<dyn std::error::Error>> {
        loop {
            select! {
                recv(frames) -> frame => {
                    let frame = frame.map_err(|_| "frame queue closed")?;
                    self.display.show(frame);
                }
                recv(reports) -> report => match report {
                    Ok(report) => {
                        self.on_report(report);
                        if self.limit_reached() {
                            return Ok(SessionEnd::FrameLimit);
                        }
                    }
                    Err(_) if self.limit_reached() => return Ok(SessionEnd::FrameLimit),
                    Err(_) => return Err("detection thread stopped".into()),
                },
                recv(counts) -> event => {
                    if let Ok(event) = event {
                        self.on_count(event);
                    }
                }
                recv(messages) -> message => match message {
                    Ok(PipelineMessage::EndOfStream) => {
                        // Frames published before end of stream are still queued.
                        let _ = commands.send(DetectCommand::Finish);
                        for frame in frames.try_iter() {
                            self.display.show(frame);
                        }
                        for report in reports.iter() {
                            self.on_report(report);
                        }
                        if self.limit_reached() {
                            return Ok(SessionEnd::FrameLimit);
                        }
                        return Ok(SessionEnd::EndOfStream);
                    }
                    Ok(PipelineMessage::Error(e)) => return Err(e.into()),
                    Ok(PipelineMessage::StateChanged { old, new }) => {
                        log::debug!("Pipeline {old} -> {new}");
                    }
                    Err(_) => return Err("pipeline bus closed".into()),
                },
                recv(interrupt) -> _ => {
                    log::info!("Interrupted, stopping capture");
                    return Ok(SessionEnd::Interrupted);
                }
            }
        }
    }

    fn on_report(&mut self, report: DetectReport) {
        self.logger
            .timing("detect", report.elapsed.as_secs_f64() * 1000.0);
        self.logger.metric("faces", report.faces.len() as f64);
        self.logger.frame();
        self.display.set_overlay(report.faces);
        self.processed += 1;
    }

    fn on_count(&mut self, event: FacesDetected) {
        if self.display.set_face_count(event.count) {
            log::info!("Faces detected: {}", event.count);
        }
    }

    fn limit_reached(&self) -> bool {
        self.options
            .max_frames
            .is_some_and(|max| self.processed >= max)
    }
}

/// Runs `detector` over `frames` until told to stop or until `limit`
/// frames have been processed. The detector is handed back on join.
fn spawn_detector(
    mut detector: FaceDetector,
    frames: Receiver<Arc<Frame>>,
    commands: Receiver<DetectCommand>,
    reports: Sender<DetectReport>,
    limit: Option<u64>,
) -> std::io::Result<JoinHandle<FaceDetector>> {
    std::thread::Builder::new()
        .name("facecap-detect".to_string())
        .spawn(move || {
            let mut done = 0u64;
            let mut process = |detector: &mut FaceDetector, frame: Arc<Frame>| {
                let started = Instant::now();
                let detection = detector.process_frame(frame);
                done += 1;
                let report = DetectReport {
                    faces: detection.faces,
                    elapsed: started.elapsed(),
                };
                reports.send(report).is_ok() && !limit.is_some_and(|max| done >= max)
            };

            loop {
                select! {
                    recv(frames) -> frame => match frame {
                        Ok(frame) => {
                            if !process(&mut detector, frame) {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    recv(commands) -> command => {
                        if let Ok(DetectCommand::Finish) = command {
                            for frame in frames.try_iter() {
                                if !process(&mut detector, frame) {
                                    break;
                                }
                            }
                        }
                        break;
                    }
                }
            }
            detector
        })
}

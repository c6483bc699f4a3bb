use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::app_sink::AppSink;
use crate::pipeline::capture_config::CaptureConfig;
use crate::pipeline::infrastructure::threaded_pipeline::{Pipeline, PipelineMessage};
use crate::pipeline::pipeline_description::PipelineDescription;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_state::PipelineState;
use crate::pipeline::source_descriptor::SourceDescriptor;
use crate::shared::constants::SINK_NAME;
use crate::shared::event_bus::EventBus;
use crate::shared::frame::Frame;
use crate::video::domain::raw_sample::RawFrameSample;
use crate::video::domain::stream_source::{FlowReturn, MediaRuntime};
use crate::video::frame_adapter;

/// Owns the lifecycle of one streaming pipeline and publishes every
/// decoded frame to its subscribers.
///
/// Call `set_source`, `start` and `stop` from a single controlling
/// thread. Frames are copied and published on the pipeline's streaming
/// thread; subscribers receive them in production order through bounded
/// queues that drop instead of stalling the producer.
pub struct PipelineController {
    runtime: Box<dyn MediaRuntime>,
    config: CaptureConfig,
    source: Option<SourceDescriptor>,
    pipeline: Option<Pipeline>,
    sink: Option<AppSink>,
    frames: EventBus<Arc<Frame>>,
    bus_tx: Sender<PipelineMessage>,
    bus_rx: Receiver<PipelineMessage>,
    running: bool,
}

impl PipelineController {
    pub fn new(runtime: Box<dyn MediaRuntime>, config: CaptureConfig) -> Self {
        let frames = EventBus::bounded(config.frame_queue_capacity);
        let (bus_tx, bus_rx) = crossbeam_channel::unbounded();
        Self {
            runtime,
            config,
            source: None,
            pipeline: None,
            sink: None,
            frames,
            bus_tx,
            bus_rx,
            running: false,
        }
    }

    /// Selects what the next `start` reads from.
    ///
    /// Refused while running; stop first to switch sources.
    pub fn set_source(&mut self, descriptor: &str) -> Result<(), PipelineError> {
        if self.running {
            log::warn!("Ignoring source change to {descriptor:?} while running");
            return Err(PipelineError::Running);
        }
        let source = SourceDescriptor::parse(descriptor)?;
        log::info!("Source set to {source}");
        self.source = Some(source);
        Ok(())
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.source.as_ref()
    }

    /// Builds the pipeline for the current source and brings it to PLAYING.
    ///
    /// A no-op when already running. On failure nothing is retained and
    /// the controller stays stopped.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.running {
            return Ok(());
        }
        let source = self.source.as_ref().ok_or(PipelineError::NoSource)?;
        let description = PipelineDescription::for_source(source, &self.config);

        let mut pipeline =
            Pipeline::launch(description, self.runtime.as_ref(), self.bus_tx.clone())?;
        let sink = pipeline
            .by_name(SINK_NAME)
            .ok_or_else(|| PipelineError::MissingElement(SINK_NAME.to_string()))?;
        sink.connect_new_sample(publish_frames(self.frames.clone()));
        log::debug!("Launching {}", pipeline.description());

        if let Err(e) = pipeline.set_state(PipelineState::Playing) {
            log::error!("Failed to start pipeline for {source}: {e}");
            sink.disconnect();
            // Dropping the pipeline walks it back to NULL.
            return Err(e);
        }

        match pipeline.caps() {
            Some(caps) => log::info!(
                "Pipeline playing from {source} at {}x{} {}",
                caps.width,
                caps.height,
                caps.format
            ),
            None => log::info!("Pipeline playing from {source}"),
        }
        self.sink = Some(sink);
        self.pipeline = Some(pipeline);
        self.running = true;
        Ok(())
    }

    /// Brings the pipeline to NULL and releases it.
    ///
    /// Once this returns no further frame is published. Safe to call when
    /// never started or already stopped.
    pub fn stop(&mut self) {
        let Some(mut pipeline) = self.pipeline.take() else {
            self.running = false;
            return;
        };
        if let Err(e) = pipeline.set_state(PipelineState::Null) {
            log::warn!("Pipeline did not reach NULL cleanly: {e}");
        }
        if let Some(sink) = self.sink.take() {
            sink.disconnect();
            log::debug!("Sink received {} samples", sink.samples_received());
        }
        drop(pipeline);
        self.running = false;
        log::info!("Pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// State of the current pipeline, NULL when there is none.
    pub fn state(&self) -> PipelineState {
        self.pipeline
            .as_ref()
            .map_or(PipelineState::Null, Pipeline::state)
    }

    /// New receiver for decoded frames. Subscribe before `start` to see
    /// the first frame.
    pub fn subscribe_frames(&self) -> Receiver<Arc<Frame>> {
        self.frames.subscribe()
    }

    /// Receiver for state changes, end of stream and streaming errors.
    pub fn messages(&self) -> Receiver<PipelineMessage> {
        self.bus_rx.clone()
    }

    /// Frames discarded because a subscriber queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.frames.dropped()
    }

    /// Samples delivered to the sink by the current pipeline.
    pub fn samples_received(&self) -> u64 {
        self.sink.as_ref().map_or(0, AppSink::samples_received)
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sink callback: copy the borrowed sample into an owned frame and
/// publish it. Always asks for more samples.
fn publish_frames(
    frames: EventBus<Arc<Frame>>,
) -> impl for<'a> FnMut(&RawFrameSample<'a>) -> FlowReturn + Send + 'static {
    let mut sequence = 0u64;
    move |sample: &RawFrameSample<'_>| {
        let frame = frame_adapter::to_owned_frame(sample, sequence);
        sequence += 1;
        if frames.publish(Arc::new(frame)) == 0 {
            log::trace!("Frame {} reached no subscriber", sequence - 1);
        }
        FlowReturn::Ok
    }
}

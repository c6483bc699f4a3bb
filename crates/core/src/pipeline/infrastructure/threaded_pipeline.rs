use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::pipeline::app_sink::AppSink;
use crate::pipeline::pipeline_description::PipelineDescription;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_state::PipelineState;
use crate::video::domain::stream_source::{
    FlowReturn, MediaRuntime, PullOutcome, SourceCaps, StreamSource,
};

const STREAM_THREAD_NAME: &str = "facecap-stream";

/// Messages posted by a pipeline to its bus.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineMessage {
    StateChanged {
        old: PipelineState,
        new: PipelineState,
    },
    EndOfStream,
    Error(String),
}

/// A launched `source -> decode -> convert -> sink` graph.
///
/// Layout: `streaming thread [source.pull -> sink callback]`
///
/// The source is owned by whoever runs it: the pipeline while stopped,
/// the streaming thread while playing. Leaving PLAYING joins the thread
/// and takes the source back, so no sample can reach the sink after
/// `set_state` returns.
pub struct Pipeline {
    description: PipelineDescription,
    state: PipelineState,
    sink: AppSink,
    source: Option<Box<dyn StreamSource>>,
    caps: Option<SourceCaps>,
    worker: Option<JoinHandle<Box<dyn StreamSource>>>,
    stop_requested: Arc<AtomicBool>,
    bus: Sender<PipelineMessage>,
}

impl Pipeline {
    /// Validates `description` and instantiates its elements in NULL.
    pub fn launch(
        description: PipelineDescription,
        runtime: &dyn MediaRuntime,
        bus: Sender<PipelineMessage>,
    ) -> Result<Self, PipelineError> {
        description.validate()?;
        log::debug!("Launching pipeline: {description}");

        let source = runtime.create_source(&description)?;
        let sink = AppSink::from_stage(&description.sink);

        Ok(Self {
            description,
            state: PipelineState::Null,
            sink,
            source: Some(source),
            caps: None,
            worker: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
            bus,
        })
    }

    /// Looks up an element by name. Only the sink is addressable.
    pub fn by_name(&self, name: &str) -> Option<AppSink> {
        (self.description.has_element(name) && self.sink.name() == name)
            .then(|| self.sink.clone())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Caps negotiated on the way to READY.
    pub fn caps(&self) -> Option<SourceCaps> {
        self.caps
    }

    pub fn description(&self) -> &PipelineDescription {
        &self.description
    }

    /// Walks one state at a time toward `target`.
    ///
    /// Stops at the first failing step and stays in the last state reached.
    pub fn set_state(&mut self, target: PipelineState) -> Result<(), PipelineError> {
        for next in self.state.path_to(target) {
            let old = self.state;
            self.step(old, next)
                .map_err(|reason| PipelineError::StateChange {
                    from: old,
                    to: next,
                    reason,
                })?;
            self.state = next;
            log::debug!("Pipeline state {old} -> {next}");
            let _ = self.bus.send(PipelineMessage::StateChanged { old, new: next });
        }
        Ok(())
    }

    fn step(&mut self, from: PipelineState, to: PipelineState) -> Result<(), String> {
        use PipelineState::*;

        match (from, to) {
            (Null, Ready) => {
                let source = self
                    .source
                    .as_mut()
                    .ok_or_else(|| "source was lost by an earlier failure".to_string())?;
                let caps = source.open().map_err(|e| e.to_string())?;
                log::debug!(
                    "Negotiated {}x{} {}",
                    caps.width,
                    caps.height,
                    caps.format
                );
                self.caps = Some(caps);
                Ok(())
            }
            (Ready, Paused) | (Paused, Ready) => Ok(()),
            (Paused, Playing) => self.spawn_worker(),
            (Playing, Paused) => {
                self.join_worker();
                Ok(())
            }
            (Ready, Null) => {
                if let Some(source) = self.source.as_mut() {
                    source.close();
                }
                self.caps = None;
                Ok(())
            }
            (from, to) => Err(format!("no direct transition from {from} to {to}")),
        }
    }

    fn spawn_worker(&mut self) -> Result<(), String> {
        let source = self
            .source
            .take()
            .ok_or_else(|| "source was lost by an earlier failure".to_string())?;
        let sink = self.sink.clone();
        let stop = Arc::clone(&self.stop_requested);
        let bus = self.bus.clone();

        stop.store(false, Ordering::Release);
        let handle = std::thread::Builder::new()
            .name(STREAM_THREAD_NAME.to_string())
            .spawn(move || run_stream(source, sink, stop, bus))
            .map_err(|e| PipelineError::Spawn(e).to_string())?;
        self.worker = Some(handle);
        Ok(())
    }

    fn join_worker(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        let Some(handle) = self.worker.take() else {
            return;
        };
        match handle.join() {
            Ok(source) => self.source = Some(source),
            Err(_) => {
                log::error!("Streaming thread panicked");
                let _ = self
                    .bus
                    .send(PipelineMessage::Error("streaming thread panicked".to_string()));
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.state != PipelineState::Null {
            if let Err(e) = self.set_state(PipelineState::Null) {
                log::warn!("Pipeline teardown incomplete: {e}");
            }
        }
    }
}

/// Streaming thread body: pull until asked to stop, end of stream, or a
/// source error. Hands the source back when done.
fn run_stream(
    mut source: Box<dyn StreamSource>,
    sink: AppSink,
    stop: Arc<AtomicBool>,
    bus: Sender<PipelineMessage>,
) -> Box<dyn StreamSource> {
    sink.reset_clock();

    while !stop.load(Ordering::Acquire) {
        match source.pull(&mut |sample| sink.push_sample(sample)) {
            Ok(PullOutcome::Delivered(FlowReturn::Ok)) => {}
            Ok(PullOutcome::Delivered(FlowReturn::Eos)) | Ok(PullOutcome::EndOfStream) => {
                log::info!("End of stream");
                let _ = bus.send(PipelineMessage::EndOfStream);
                break;
            }
            Err(e) => {
                log::error!("Streaming stopped: {e}");
                let _ = bus.send(PipelineMessage::Error(e.to_string()));
                break;
            }
        }
    }

    source
}

use thiserror::Error;

use crate::pipeline::pipeline_state::PipelineState;
use crate::video::domain::raw_sample::SampleError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no source selected")]
    NoSource,
    #[error("invalid source descriptor {descriptor:?}: {reason}")]
    InvalidSource {
        descriptor: String,
        reason: &'static str,
    },
    #[error("source cannot change while the pipeline is running")]
    Running,
    #[error("invalid pipeline description: {0}")]
    InvalidDescription(String),
    #[error("no element named {0:?} in pipeline")]
    MissingElement(String),
    #[error("state change {from} -> {to} failed: {reason}")]
    StateChange {
        from: PipelineState,
        to: PipelineState,
        reason: String,
    },
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("media error: {0}")]
    Media(#[from] ffmpeg_next::Error),
    #[error("malformed sample: {0}")]
    Sample(#[from] SampleError),
    #[error("failed to spawn streaming thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{0}")]
    Source(String),
}

use crate::pipeline::pipeline_description::PipelineDescription;
use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::pixel_format::PixelFormat;
use crate::video::domain::raw_sample::RawFrameSample;

/// Caps negotiated when a source is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceCaps {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Nominal frame rate, when the container or device reports one.
    pub framerate: Option<(u32, u32)>,
}

/// Verdict of a sink on one delivered sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowReturn {
    Ok,
    Eos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullOutcome {
    /// One sample was handed to the sink, which answered with the flow value.
    Delivered(FlowReturn),
    EndOfStream,
}

/// Callback a source hands each decoded sample to.
///
/// The sample borrows the source's scratch buffers and is only valid for
/// the duration of the call.
pub type SampleSink<'s> = dyn FnMut(&RawFrameSample<'_>) -> FlowReturn + 's;

/// Produces decoded, color-converted samples for one pipeline.
///
/// Implementations handle container, codec and device details while the
/// pipeline only deals in [`RawFrameSample`]s.
pub trait StreamSource: Send {
    /// Acquires the underlying resources and negotiates caps.
    fn open(&mut self) -> Result<SourceCaps, PipelineError>;

    /// Decodes until one sample is available and hands it to `sink`.
    fn pull(&mut self, sink: &mut SampleSink<'_>) -> Result<PullOutcome, PipelineError>;

    /// Releases any resources held by the source. Safe to call repeatedly.
    fn close(&mut self);
}

/// Instantiates sources for pipeline descriptions.
pub trait MediaRuntime: Send + Sync {
    fn create_source(
        &self,
        description: &PipelineDescription,
    ) -> Result<Box<dyn StreamSource>, PipelineError>;
}

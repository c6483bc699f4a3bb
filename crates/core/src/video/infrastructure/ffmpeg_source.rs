use std::path::Path;
use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::pipeline::pipeline_description::{DeviceCaps, PipelineDescription, SourceStage};
use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::pixel_format::PixelFormat;
use crate::video::domain::raw_sample::RawFrameSample;
use crate::video::domain::stream_source::{
    MediaRuntime, PullOutcome, SampleSink, SourceCaps, StreamSource,
};

/// Media runtime backed by ffmpeg-next (libavformat, libavcodec,
/// libavdevice and libswscale).
pub struct FfmpegRuntime;

impl FfmpegRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaRuntime for FfmpegRuntime {
    fn create_source(
        &self,
        description: &PipelineDescription,
    ) -> Result<Box<dyn StreamSource>, PipelineError> {
        description.validate()?;
        Ok(Box::new(FfmpegSource::new(
            description.source.clone(),
            description.convert.output,
        )))
    }
}

/// Demuxes, decodes and color-converts one file or capture device.
///
/// Each decoded frame is scaled into a reusable scratch frame in the
/// requested output layout and lent to the sink as a [`RawFrameSample`].
pub struct FfmpegSource {
    stage: SourceStage,
    output: PixelFormat,
    stream: Option<OpenStream>,
}

// Safety: FfmpegSource is owned by exactly one thread at a time. The
// pipeline moves it into its streaming worker and takes it back on join;
// the raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegSource {}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base: ffmpeg_next::Rational,
    width: u32,
    height: u32,
    decoded: ffmpeg_next::util::frame::video::Video,
    converted: ffmpeg_next::util::frame::video::Video,
    flushing: bool,
}

impl FfmpegSource {
    pub fn new(stage: SourceStage, output: PixelFormat) -> Self {
        Self {
            stage,
            output,
            stream: None,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, PipelineError> {
        match &self.stage {
            SourceStage::File { location } => open_file(location),
            SourceStage::Device { index, caps } => open_device(*index, caps),
        }
    }
}

impl StreamSource for FfmpegSource {
    fn open(&mut self) -> Result<SourceCaps, PipelineError> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PipelineError::Source("no video stream found".to_string()))?;

        let stream_index = stream.index();
        let time_base = stream.time_base();
        let rate = stream.rate();
        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            to_ffmpeg_pixel(self.output),
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let framerate = (rate.numerator() > 0 && rate.denominator() > 0)
            .then(|| (rate.numerator() as u32, rate.denominator() as u32));

        log::debug!(
            "Opened {:?}: {width}x{height} {:?} -> {}",
            self.stage,
            decoder.format(),
            self.output
        );

        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            width,
            height,
            decoded: ffmpeg_next::util::frame::video::Video::empty(),
            converted: ffmpeg_next::util::frame::video::Video::empty(),
            flushing: false,
        });

        Ok(SourceCaps {
            width,
            height,
            format: self.output,
            framerate,
        })
    }

    fn pull(&mut self, sink: &mut SampleSink<'_>) -> Result<PullOutcome, PipelineError> {
        let output = self.output;
        let Some(stream) = self.stream.as_mut() else {
            return Err(PipelineError::Source("source is not open".to_string()));
        };

        loop {
            if stream.receive()? {
                let sample = RawFrameSample::new(
                    stream.converted.data(0),
                    stream.width,
                    stream.height,
                    stream.converted.stride(0),
                    output,
                )?
                .with_pts(stream.pts());
                return Ok(PullOutcome::Delivered(sink(&sample)));
            }

            if stream.flushing {
                return Ok(PullOutcome::EndOfStream);
            }

            let next_packet = stream.ictx.packets().next();
            match next_packet {
                Some((packet_stream, packet)) => {
                    if packet_stream.index() != stream.stream_index {
                        continue;
                    }
                    if let Err(e) = stream.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = stream.decoder.send_eof();
                    stream.flushing = true;
                }
            }
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

impl OpenStream {
    /// Pulls one decoded frame and converts it, if the decoder has one.
    fn receive(&mut self) -> Result<bool, PipelineError> {
        if self.decoder.receive_frame(&mut self.decoded).is_err() {
            return Ok(false);
        }
        self.scaler.run(&self.decoded, &mut self.converted)?;
        Ok(true)
    }

    fn pts(&self) -> Option<Duration> {
        let ticks = self.decoded.timestamp().or(self.decoded.pts())?;
        pts_to_duration(ticks, self.time_base)
    }
}

fn pts_to_duration(ticks: i64, time_base: ffmpeg_next::Rational) -> Option<Duration> {
    if ticks < 0 || time_base.denominator() <= 0 || time_base.numerator() <= 0 {
        return None;
    }
    let secs = ticks as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    Some(Duration::from_secs_f64(secs))
}

fn open_file(location: &Path) -> Result<ffmpeg_next::format::context::Input, PipelineError> {
    ffmpeg_next::format::input(location).map_err(|source| PipelineError::Open {
        target: location.display().to_string(),
        source,
    })
}

fn open_device(
    index: u32,
    caps: &DeviceCaps,
) -> Result<ffmpeg_next::format::context::Input, PipelineError> {
    ffmpeg_next::device::register_all();

    let (demuxer, url) = device_target(index);
    let format = ffmpeg_next::device::input::video()
        .find(|fmt| fmt.name().split(',').any(|name| name == demuxer))
        .ok_or_else(|| PipelineError::Source(format!("capture demuxer {demuxer} unavailable")))?;

    let mut options = ffmpeg_next::Dictionary::new();
    options.set("video_size", &format!("{}x{}", caps.width, caps.height));
    options.set(
        "framerate",
        &format!("{}/{}", caps.framerate.0, caps.framerate.1),
    );
    options.set(pixel_option_key(), ffmpeg_pixel_name(caps.format));

    let context = ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::format::Format::Input(format),
        options,
    )
    .map_err(|source| PipelineError::Open {
        target: url.clone(),
        source,
    })?;

    match context {
        ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
        ffmpeg_next::format::context::Context::Output(_) => Err(PipelineError::Source(format!(
            "{url} opened as an output"
        ))),
    }
}

#[cfg(target_os = "macos")]
fn device_target(index: u32) -> (&'static str, String) {
    ("avfoundation", format!("{index}:none"))
}

#[cfg(not(target_os = "macos"))]
fn device_target(index: u32) -> (&'static str, String) {
    ("v4l2", format!("/dev/video{index}"))
}

#[cfg(target_os = "macos")]
fn pixel_option_key() -> &'static str {
    "pixel_format"
}

#[cfg(not(target_os = "macos"))]
fn pixel_option_key() -> &'static str {
    "input_format"
}

fn ffmpeg_pixel_name(format: PixelFormat) -> &'static str {
    match format {
        PixelFormat::Rgb24 => "rgb24",
        PixelFormat::Bgr24 => "bgr24",
        PixelFormat::Rgba32 => "rgba",
        PixelFormat::Bgra32 => "bgra",
        PixelFormat::Gray8 => "gray",
        PixelFormat::Yuyv422 => "yuyv422",
    }
}

fn to_ffmpeg_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba32 => Pixel::RGBA,
        PixelFormat::Bgra32 => Pixel::BGRA,
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Yuyv422 => Pixel::YUYV422,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capture_config::CaptureConfig;
    use crate::pipeline::source_descriptor::SourceDescriptor;
    use crate::video::domain::stream_source::FlowReturn;

    fn file_source(path: &Path) -> FfmpegSource {
        FfmpegSource::new(
            SourceStage::File {
                location: path.to_path_buf(),
            },
            PixelFormat::Rgb24,
        )
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut source = file_source(Path::new("/nonexistent/test.mp4"));
        assert!(matches!(source.open(), Err(PipelineError::Open { .. })));
    }

    #[test]
    fn test_pull_before_open_fails() {
        let mut source = file_source(Path::new("unused.mp4"));
        assert!(source.pull(&mut |_| FlowReturn::Ok).is_err());
    }

    #[test]
    fn test_close_without_open_is_noop() {
        let mut source = file_source(Path::new("unused.mp4"));
        source.close();
        assert!(source.pull(&mut |_| FlowReturn::Ok).is_err());
    }

    #[test]
    fn test_runtime_validates_description() {
        let descriptor = SourceDescriptor::parse("clip.mp4").unwrap();
        let mut description =
            PipelineDescription::for_source(&descriptor, &CaptureConfig::default());
        description.sink.emit_signals = false;
        assert!(FfmpegRuntime::new().create_source(&description).is_err());
    }

    #[test]
    fn test_pixel_names_match_ffmpeg() {
        assert_eq!(ffmpeg_pixel_name(PixelFormat::Rgb24), "rgb24");
        assert_eq!(to_ffmpeg_pixel(PixelFormat::Bgra32), Pixel::BGRA);
        assert_eq!(to_ffmpeg_pixel(PixelFormat::Yuyv422), Pixel::YUYV422);
    }

    #[test]
    fn test_pts_to_duration() {
        let tb = ffmpeg_next::Rational(1, 25);
        assert_eq!(pts_to_duration(50, tb), Some(Duration::from_secs(2)));
        assert_eq!(pts_to_duration(-1, tb), None);
        assert_eq!(pts_to_duration(1, ffmpeg_next::Rational(0, 1)), None);
    }
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use facecap_core::pipeline::pipeline_description::PipelineDescription;
use facecap_core::pipeline::pipeline_error::PipelineError;
use facecap_core::shared::pixel_format::PixelFormat;
use facecap_core::shared::rect::Rect;
use facecap_core::video::domain::raw_sample::RawFrameSample;
use facecap_core::video::domain::stream_source::{
    MediaRuntime, PullOutcome, SampleSink, SourceCaps, StreamSource,
};
use ffmpeg_next::format::Pixel;

/// A 24x24 single-stage cascade that fires on a dark horizontal band
/// above a lighter area.
pub const BAND_CASCADE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>5.0000000000000000e-01</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000000000001e-01</internalNodes>
          <leafValues>
            0. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          4 4 16 8 -1.</_>
        <_>
          4 8 16 4 2.</_></rects></_></features></cascade>
</opencv_storage>
"#;

pub const SCENE_WIDTH: u32 = 160;
pub const SCENE_HEIGHT: u32 = 120;
pub const BAND: Rect = Rect::new(50, 40, 40, 10);

/// Packed RGB scene: light gray canvas with one dark band, or a plain
/// canvas when `with_band` is false.
pub fn scene_rgb(with_band: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity((SCENE_WIDTH * SCENE_HEIGHT * 3) as usize);
    for y in 0..SCENE_HEIGHT as i32 {
        for x in 0..SCENE_WIDTH as i32 {
            let value = if with_band && BAND.contains_point(x, y) {
                40
            } else {
                200
            };
            data.extend_from_slice(&[value, value, value]);
        }
    }
    data
}

pub fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

// ── Scripted media runtime ──

/// Plays a fixed list of RGB scenes, then reports end of stream.
pub struct ScriptedRuntime {
    pub scenes: Vec<bool>,
    pub pulls: Arc<AtomicUsize>,
}

impl ScriptedRuntime {
    pub fn new(scenes: Vec<bool>) -> Self {
        Self {
            scenes,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MediaRuntime for ScriptedRuntime {
    fn create_source(
        &self,
        _description: &PipelineDescription,
    ) -> Result<Box<dyn StreamSource>, PipelineError> {
        Ok(Box::new(ScriptedSource {
            scenes: self.scenes.clone(),
            next: 0,
            pulls: Arc::clone(&self.pulls),
        }))
    }
}

struct ScriptedSource {
    scenes: Vec<bool>,
    next: usize,
    pulls: Arc<AtomicUsize>,
}

impl StreamSource for ScriptedSource {
    fn open(&mut self) -> Result<SourceCaps, PipelineError> {
        Ok(SourceCaps {
            width: SCENE_WIDTH,
            height: SCENE_HEIGHT,
            format: PixelFormat::Rgb24,
            framerate: Some((30, 1)),
        })
    }

    fn pull(&mut self, sink: &mut SampleSink<'_>) -> Result<PullOutcome, PipelineError> {
        let Some(&with_band) = self.scenes.get(self.next) else {
            return Ok(PullOutcome::EndOfStream);
        };
        self.next += 1;
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let data = scene_rgb(with_band);
        let sample = RawFrameSample::new(
            &data,
            SCENE_WIDTH,
            SCENE_HEIGHT,
            SCENE_WIDTH as usize * 3,
            PixelFormat::Rgb24,
        )?
        .with_pts(Some(Duration::from_millis(self.next as u64 * 33)));
        Ok(PullOutcome::Delivered(sink(&sample)))
    }

    fn close(&mut self) {}
}

// ── Generated media ──

/// Encodes `num_frames` MPEG-4 frames at `fps`. Frame `i` is a flat gray
/// level of `i * 40` (mod 256), so every frame decodes to a distinct image.
pub fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
    ffmpeg_next::init().unwrap();
    let rate = ffmpeg_next::Rational(1, fps);

    let mut octx = ffmpeg_next::format::output(path).unwrap();
    let needs_global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
    let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();

    let mut video = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .unwrap();
    video.set_width(width);
    video.set_height(height);
    video.set_format(Pixel::YUV420P);
    video.set_time_base(rate);
    video.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
    if needs_global_header {
        video.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }
    let mut encoder = video.open_with(ffmpeg_next::Dictionary::new()).unwrap();
    octx.add_stream(Some(codec))
        .unwrap()
        .set_parameters(&encoder);
    octx.write_header().unwrap();

    let mut to_yuv = ffmpeg_next::software::scaling::Context::get(
        Pixel::RGB24,
        width,
        height,
        Pixel::YUV420P,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .unwrap();

    for i in 0..num_frames {
        let level = ((i * 40) % 256) as u8;
        let mut rgb = ffmpeg_next::util::frame::video::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        for row in rgb.data_mut(0).chunks_mut(stride).take(height as usize) {
            row[..width as usize * 3].fill(level);
        }
        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        to_yuv.run(&rgb, &mut yuv).unwrap();
        yuv.set_pts(Some(i as i64));
        encoder.send_frame(&yuv).unwrap();
        write_packets(&mut encoder, &mut octx, rate);
    }
    encoder.send_eof().unwrap();
    write_packets(&mut encoder, &mut octx, rate);
    octx.write_trailer().unwrap();
}

/// Moves every packet the encoder has ready into stream 0 of `octx`.
fn write_packets(
    encoder: &mut ffmpeg_next::encoder::Video,
    octx: &mut ffmpeg_next::format::context::Output,
    rate: ffmpeg_next::Rational,
) {
    let stream_rate = octx.stream(0).unwrap().time_base();
    let mut packet = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(0);
        packet.rescale_ts(rate, stream_rate);
        packet.write_interleaved(octx).unwrap();
    }
}

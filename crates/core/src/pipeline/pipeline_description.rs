use std::fmt;
use std::path::{Path, PathBuf};

use crate::pipeline::capture_config::CaptureConfig;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::source_descriptor::SourceDescriptor;
use crate::shared::constants::SINK_NAME;
use crate::shared::pixel_format::PixelFormat;

/// Fixed format requested from a capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCaps {
    pub width: u32,
    pub height: u32,
    pub framerate: (u32, u32),
    pub format: PixelFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceStage {
    Device { index: u32, caps: DeviceCaps },
    File { location: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStage {
    /// Raw device output, nothing to decode.
    None,
    /// Container and codec chosen from the stream itself.
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertStage {
    pub output: PixelFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkStage {
    pub name: String,
    pub emit_signals: bool,
    pub sync: bool,
    pub drop: bool,
    /// Depth of each consumer queue; newer samples are dropped once full.
    pub max_buffers: u32,
}

/// Typed `source -> decode -> convert -> sink` graph.
///
/// Built from a [`SourceDescriptor`]; user-supplied paths are only ever
/// stored as [`PathBuf`] and quoted when rendered as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineDescription {
    pub source: SourceStage,
    pub decode: DecodeStage,
    pub convert: ConvertStage,
    pub sink: SinkStage,
}

impl PipelineDescription {
    pub fn for_source(source: &SourceDescriptor, config: &CaptureConfig) -> Self {
        let (source, decode) = match source {
            SourceDescriptor::Device(index) => (
                SourceStage::Device {
                    index: *index,
                    caps: DeviceCaps {
                        width: config.device_width,
                        height: config.device_height,
                        framerate: config.device_framerate,
                        format: config.device_format,
                    },
                },
                DecodeStage::None,
            ),
            SourceDescriptor::File(path) => (
                SourceStage::File {
                    location: path.clone(),
                },
                DecodeStage::Auto,
            ),
        };

        Self {
            source,
            decode,
            convert: ConvertStage {
                output: config.output_format,
            },
            sink: SinkStage {
                name: SINK_NAME.to_string(),
                emit_signals: true,
                sync: config.sync,
                drop: true,
                max_buffers: config.frame_queue_capacity.max(1) as u32,
            },
        }
    }

    /// Rejects graphs the runtime cannot stream without stalling or
    /// without a sample notification.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sink.name.is_empty() {
            return Err(PipelineError::InvalidDescription(
                "sink has no name".to_string(),
            ));
        }
        if !self.sink.emit_signals {
            return Err(PipelineError::InvalidDescription(
                "sink must emit a signal per sample".to_string(),
            ));
        }
        if !self.sink.drop {
            return Err(PipelineError::InvalidDescription(
                "sink must drop rather than block when full".to_string(),
            ));
        }
        if self.convert.output.channels().is_none() {
            return Err(PipelineError::InvalidDescription(format!(
                "convert output {} is not an interleaved color layout",
                self.convert.output
            )));
        }
        match &self.source {
            SourceStage::Device { caps, .. } => {
                if caps.width == 0 || caps.height == 0 || caps.framerate.1 == 0 {
                    return Err(PipelineError::InvalidDescription(format!(
                        "device caps {}x{}@{}/{} are not usable",
                        caps.width, caps.height, caps.framerate.0, caps.framerate.1
                    )));
                }
            }
            SourceStage::File { location } => {
                if self.decode != DecodeStage::Auto {
                    return Err(PipelineError::InvalidDescription(
                        "file sources need a decode stage".to_string(),
                    ));
                }
                if location.as_os_str().is_empty() {
                    return Err(PipelineError::InvalidDescription(
                        "file source has no location".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Names the sink stage answers to.
    pub fn has_element(&self, name: &str) -> bool {
        self.sink.name == name
    }
}

fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for PipelineDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            SourceStage::Device { index, caps } => {
                if cfg!(target_os = "macos") {
                    write!(f, "avfvideosrc device-index={index}")?;
                } else {
                    write!(f, "v4l2src device=/dev/video{index}")?;
                }
                write!(
                    f,
                    " ! video/x-raw,format={},width={},height={},framerate={}/{}",
                    caps.format, caps.width, caps.height, caps.framerate.0, caps.framerate.1
                )?;
            }
            SourceStage::File { location } => {
                write!(f, "filesrc location={}", quote_path(location))?;
            }
        }
        if self.decode == DecodeStage::Auto {
            f.write_str(" ! decodebin")?;
        }
        write!(
            f,
            " ! videoconvert ! video/x-raw,format={} ! appsink name={} emit-signals={} sync={} drop={} max-buffers={}",
            self.convert.output,
            self.sink.name,
            self.sink.emit_signals,
            self.sink.sync,
            self.sink.drop,
            self.sink.max_buffers
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(source: &str) -> PipelineDescription {
        let descriptor = SourceDescriptor::parse(source).unwrap();
        PipelineDescription::for_source(&descriptor, &CaptureConfig::default())
    }

    #[test]
    fn test_device_requests_fixed_caps_without_decode() {
        let description = describe("0");
        assert_eq!(description.decode, DecodeStage::None);
        match description.source {
            SourceStage::Device { index, caps } => {
                assert_eq!(index, 0);
                assert_eq!((caps.width, caps.height), (640, 480));
                assert_eq!(caps.framerate, (30, 1));
                assert_eq!(caps.format, PixelFormat::Yuyv422);
            }
            other => panic!("expected device source, got {other:?}"),
        }
    }

    #[test]
    fn test_file_goes_through_decode() {
        let description = describe("clip.mp4");
        assert_eq!(description.decode, DecodeStage::Auto);
        assert_eq!(
            description.source,
            SourceStage::File {
                location: PathBuf::from("clip.mp4")
            }
        );
    }

    #[test]
    fn test_sink_never_blocks_the_producer() {
        let description = describe("1");
        assert_eq!(description.sink.name, "sink");
        assert!(description.sink.emit_signals);
        assert!(!description.sink.sync);
        assert!(description.sink.drop);
        assert!(description.has_element("sink"));
        assert!(!description.has_element("src"));
        assert!(description.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blocking_sink() {
        let mut description = describe("clip.mp4");
        description.sink.drop = false;
        assert!(matches!(
            description.validate(),
            Err(PipelineError::InvalidDescription(_))
        ));
    }

    #[test]
    fn test_validate_rejects_file_without_decode() {
        let mut description = describe("clip.mp4");
        description.decode = DecodeStage::None;
        assert!(description.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_color_output() {
        let mut description = describe("0");
        description.convert.output = PixelFormat::Gray8;
        assert!(description.validate().is_err());
    }

    #[test]
    fn test_text_form_quotes_and_escapes_paths() {
        let description = describe(r#"my "odd" \ file.mp4"#);
        let text = description.to_string();
        assert!(text.starts_with(r#"filesrc location="my \"odd\" \\ file.mp4" ! decodebin"#));
        assert!(text.ends_with(
            "videoconvert ! video/x-raw,format=RGB ! appsink name=sink emit-signals=true sync=false drop=true max-buffers=4"
        ));
    }

    #[test]
    fn test_text_form_for_device_includes_caps() {
        let text = describe("0").to_string();
        assert!(text.contains("video/x-raw,format=YUY2,width=640,height=480,framerate=30/1"));
        assert!(!text.contains("decodebin"));
    }
}

use crate::shared::constants::{
    DEFAULT_FRAME_QUEUE_CAPACITY, DEVICE_FRAMERATE, DEVICE_HEIGHT, DEVICE_WIDTH,
};
use crate::shared::pixel_format::PixelFormat;

/// Settings that shape the pipeline built by the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    /// Geometry requested from capture devices. Files negotiate their own.
    pub device_width: u32,
    pub device_height: u32,
    pub device_framerate: (u32, u32),
    pub device_format: PixelFormat,
    /// Layout the convert stage hands to the sink.
    pub output_format: PixelFormat,
    /// Frames queued per subscriber before newer ones are dropped.
    pub frame_queue_capacity: usize,
    /// Pace delivery by presentation timestamp instead of decode speed.
    pub sync: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_width: DEVICE_WIDTH,
            device_height: DEVICE_HEIGHT,
            device_framerate: DEVICE_FRAMERATE,
            device_format: PixelFormat::Yuyv422,
            output_format: PixelFormat::Rgb24,
            frame_queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
            sync: false,
        }
    }
}

/// Cascade definition loaded by name at detector construction.
pub const CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";

/// Directory (relative to the working directory) that receives face crops.
pub const DEFAULT_OUTPUT_DIR: &str = "faces";
pub const FACE_FILE_EXTENSION: &str = "jpg";
pub const FACE_FILE_PREFIX: &str = "face";

/// Name under which the pipeline exposes its terminal sink.
pub const SINK_NAME: &str = "sink";

pub const DEVICE_WIDTH: u32 = 640;
pub const DEVICE_HEIGHT: u32 = 480;
pub const DEVICE_FRAMERATE: (u32, u32) = (30, 1);

/// Frames buffered per subscriber before new ones are dropped.
pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 4;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 3;
pub const DEFAULT_MIN_FACE_SIZE: (u32, u32) = (30, 30);

/// Marker drawn around each detection, in detector (BGR) order.
pub const MARKER_COLOR_BGR: [u8; 3] = [0, 255, 0];
pub const MARKER_THICKNESS: u32 = 2;

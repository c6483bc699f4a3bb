use std::fmt;

/// Pixel layouts that can appear on a decoded sample.
///
/// Channel names follow memory order: `Bgra32` stores blue first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Rgba32,
    Bgra32,
    Gray8,
    /// Packed 4:2:2, two pixels per `Y0 U Y1 V` quad.
    Yuyv422,
}

/// How the frame adapter treats a format on ingest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatClass {
    FourChannel,
    ThreeChannel,
    Other,
}

impl PixelFormat {
    pub fn class(self) -> FormatClass {
        match self {
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => FormatClass::FourChannel,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => FormatClass::ThreeChannel,
            PixelFormat::Gray8 | PixelFormat::Yuyv422 => FormatClass::Other,
        }
    }

    /// Interleaved color channels, or `None` for formats that must be
    /// normalized before they can back a [`Frame`](crate::shared::frame::Frame).
    pub fn channels(self) -> Option<u8> {
        match self.class() {
            FormatClass::FourChannel => Some(4),
            FormatClass::ThreeChannel => Some(3),
            FormatClass::Other => None,
        }
    }

    /// Bytes occupied by one tightly packed row of `width` pixels.
    pub fn row_bytes(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => w * 4,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => w * 3,
            PixelFormat::Gray8 => w,
            // Odd widths still occupy a whole macropixel.
            PixelFormat::Yuyv422 => w.div_ceil(2) * 4,
        }
    }

    /// True when the red channel is stored before blue.
    pub fn is_red_first(self) -> bool {
        matches!(self, PixelFormat::Rgb24 | PixelFormat::Rgba32)
    }

    /// Caps-style name used in pipeline descriptions.
    pub fn caps_name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "RGB",
            PixelFormat::Bgr24 => "BGR",
            PixelFormat::Rgba32 => "RGBA",
            PixelFormat::Bgra32 => "BGRA",
            PixelFormat::Gray8 => "GRAY8",
            PixelFormat::Yuyv422 => "YUY2",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.caps_name())
    }
}

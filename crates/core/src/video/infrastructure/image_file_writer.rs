use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;
use crate::video::domain::image_writer::ImageWriter;

/// Writes a single frame to an image file using the `image` crate.
///
/// Any frame layout is converted to packed RGB first, so alpha is dropped
/// and blue-first frames are reordered.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), to_rgb(frame))
            .ok_or("Failed to create image from frame data")?;
        img.save(path)?;
        Ok(())
    }
}

fn to_rgb(frame: &Frame) -> Vec<u8> {
    let channels = frame.channels() as usize;
    if frame.format() == PixelFormat::Rgb24 {
        return frame.data().to_vec();
    }
    let red_first = frame.format().is_red_first();
    let mut rgb = Vec::with_capacity(frame.data().len() / channels * 3);
    for px in frame.data().chunks_exact(channels) {
        if red_first {
            rgb.extend_from_slice(&[px[0], px[1], px[2]]);
        } else {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }
    rgb
}

//! Conversions between borrowed samples, owned frames and detection
//! buffers.
//!
//! Every function here returns freshly owned memory, except
//! [`into_detection_buffer`], which consumes its frame and reuses that
//! allocation.

use crate::shared::detection_buffer::{BufferOrder, DetectionBuffer};
use crate::shared::frame::Frame;
use crate::shared::pixel_format::{FormatClass, PixelFormat};
use crate::video::domain::raw_sample::RawFrameSample;

/// Deep-copies a borrowed sample into an owned, tightly packed frame.
///
/// 4-channel and 3-channel layouts are copied as they are; any other
/// layout is normalized to RGB on the way in.
pub fn to_owned_frame(sample: &RawFrameSample<'_>, sequence: u64) -> Frame {
    let (width, height) = (sample.width(), sample.height());
    let format = sample.format();

    match format.class() {
        FormatClass::FourChannel | FormatClass::ThreeChannel => {
            let mut data = Vec::with_capacity(format.row_bytes(width) * height as usize);
            for row in sample.rows() {
                data.extend_from_slice(row);
            }
            Frame::new(data, width, height, format, sequence)
        }
        FormatClass::Other => {
            let mut data = Vec::with_capacity(width as usize * height as usize * 3);
            for row in sample.rows() {
                match format {
                    PixelFormat::Yuyv422 => yuyv_row_to_rgb(row, width as usize, &mut data),
                    _ => gray_row_to_rgb(row, &mut data),
                }
            }
            Frame::new(data, width, height, PixelFormat::Rgb24, sequence)
        }
    }
}

/// Copies a frame into a buffer in detector-native (blue-first) order.
///
/// Used when the frame is shared with other subscribers.
pub fn to_detection_buffer(frame: &Frame) -> DetectionBuffer {
    let mut data = frame.data().to_vec();
    let order = reorder_to_detection(frame.format(), &mut data);
    DetectionBuffer::new(data, frame.width(), frame.height(), order)
}

/// Turns a uniquely owned frame into a detection buffer without copying;
/// red-first layouts are swapped in place.
pub fn into_detection_buffer(frame: Frame) -> DetectionBuffer {
    let (width, height, format) = (frame.width(), frame.height(), frame.format());
    let mut data = frame.into_data();
    let order = reorder_to_detection(format, &mut data);
    DetectionBuffer::new(data, width, height, order)
}

/// Converts a detection buffer back into a frame the display path can
/// render: 3-channel buffers are swapped to RGB, 4-channel buffers stay BGRA.
pub fn to_display_image(buffer: &DetectionBuffer, sequence: u64) -> Frame {
    let mut data = buffer.data().to_vec();
    let format = match buffer.order() {
        BufferOrder::Bgr => {
            swap_red_blue(&mut data, 3);
            PixelFormat::Rgb24
        }
        BufferOrder::Bgra => PixelFormat::Bgra32,
    };
    Frame::new(data, buffer.width(), buffer.height(), format, sequence)
}

fn reorder_to_detection(format: PixelFormat, data: &mut [u8]) -> BufferOrder {
    let order = match format {
        PixelFormat::Rgba32 | PixelFormat::Bgra32 => BufferOrder::Bgra,
        _ => BufferOrder::Bgr,
    };
    if format.is_red_first() {
        swap_red_blue(data, order.channels());
    }
    order
}

fn swap_red_blue(data: &mut [u8], channels: usize) {
    for px in data.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
}

fn gray_row_to_rgb(row: &[u8], out: &mut Vec<u8>) {
    for &luma in row {
        out.extend_from_slice(&[luma, luma, luma]);
    }
}

/// BT.601 limited range, integer approximation.
fn yuyv_row_to_rgb(row: &[u8], width: usize, out: &mut Vec<u8>) {
    let mut emitted = 0;
    for quad in row.chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        for y in [y0, y1] {
            if emitted == width {
                return;
            }
            out.extend_from_slice(&yuv_to_rgb(y, u, v));
            emitted += 1;
        }
    }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

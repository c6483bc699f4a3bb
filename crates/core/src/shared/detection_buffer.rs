use image::GrayImage;
use ndarray::{s, ArrayView3, ArrayViewMut3};

use crate::shared::rect::Rect;

/// Channel order of a [`DetectionBuffer`]. Blue comes first, which is the
/// native order of the cascade stage and of the marker colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferOrder {
    Bgr,
    Bgra,
}

impl BufferOrder {
    pub fn channels(self) -> usize {
        match self {
            BufferOrder::Bgr => 3,
            BufferOrder::Bgra => 4,
        }
    }
}

/// Mutable working image used for detection, annotation and cropping.
///
/// Always owns its pixels; it is never a view into a frame that another
/// subscriber may still be reading.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    order: BufferOrder,
}

impl DetectionBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: BufferOrder) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * order.channels(),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            order,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> BufferOrder {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.order.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("DetectionBuffer data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("DetectionBuffer data length must match dimensions")
    }

    /// Single-channel luminance using BT.601 weights, rounded.
    pub fn to_gray(&self) -> GrayImage {
        let channels = self.channels();
        let luma: Vec<u8> = self
            .data
            .chunks_exact(channels)
            .map(|px| {
                let (b, g, r) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            })
            .collect();
        GrayImage::from_raw(self.width, self.height, luma)
            .expect("luma buffer has exactly width * height bytes")
    }

    /// Draws a `thickness`-pixel outline just inside `rect`.
    ///
    /// `color` is blue, green, red. Parts of `rect` outside the buffer are
    /// ignored.
    pub fn draw_rectangle(&mut self, rect: &Rect, color: [u8; 3], thickness: u32) {
        let Some(visible) = rect.clamp_to(self.width, self.height) else {
            return;
        };
        let t = thickness.max(1) as i32;
        let order = self.order;
        let mut pixels = self.as_ndarray_mut();

        for y in visible.y..visible.bottom() {
            for x in visible.x..visible.right() {
                let on_border = x < rect.x + t
                    || x >= rect.right() - t
                    || y < rect.y + t
                    || y >= rect.bottom() - t;
                if !on_border {
                    continue;
                }
                let (row, col) = (y as usize, x as usize);
                pixels[[row, col, 0]] = color[0];
                pixels[[row, col, 1]] = color[1];
                pixels[[row, col, 2]] = color[2];
                if order == BufferOrder::Bgra {
                    pixels[[row, col, 3]] = u8::MAX;
                }
            }
        }
    }

    /// Copies the region under `rect`, clamped to the buffer.
    ///
    /// Returns `None` when the rectangle does not overlap the buffer.
    pub fn crop(&self, rect: &Rect) -> Option<DetectionBuffer> {
        let r = rect.clamp_to(self.width, self.height)?;
        let (x1, y1) = (r.x as usize, r.y as usize);
        let (x2, y2) = (r.right() as usize, r.bottom() as usize);

        let region = self.as_ndarray();
        let data: Vec<u8> = region
            .slice(s![y1..y2, x1..x2, ..])
            .iter()
            .copied()
            .collect();

        Some(DetectionBuffer::new(
            data,
            r.width as u32,
            r.height as u32,
            self.order,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, self.channels())
    }
}

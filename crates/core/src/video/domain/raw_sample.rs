use std::time::Duration;

use thiserror::Error;

use crate::shared::pixel_format::PixelFormat;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },
    #[error("stride {stride} is smaller than a packed {format} row of {row_bytes} bytes")]
    StrideTooSmall {
        stride: usize,
        row_bytes: usize,
        format: PixelFormat,
    },
    #[error("buffer holds {len} bytes but {required} are needed")]
    BufferTooShort { len: usize, required: usize },
}

/// Borrowed view of one decoded sample, valid only while the sink
/// callback runs.
///
/// Deliberately neither `Clone` nor `Copy`: callbacks receive it as
/// `&RawFrameSample<'_>` and the only way to keep its pixels is to copy
/// them into an owned [`Frame`](crate::shared::frame::Frame) through the
/// frame adapter.
#[derive(Debug)]
pub struct RawFrameSample<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    pts: Option<Duration>,
}

impl<'a> RawFrameSample<'a> {
    /// Wraps `data` laid out as `height` rows of `stride` bytes.
    ///
    /// The last row only needs to hold the packed pixels, not the full
    /// stride, matching how decoders size their planes.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, SampleError> {
        if width == 0 || height == 0 {
            return Err(SampleError::ZeroSize { width, height });
        }
        let row_bytes = format.row_bytes(width);
        if stride < row_bytes {
            return Err(SampleError::StrideTooSmall {
                stride,
                row_bytes,
                format,
            });
        }
        let required = stride * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(SampleError::BufferTooShort {
                len: data.len(),
                required,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
            pts: None,
        })
    }

    pub fn with_pts(mut self, pts: Option<Duration>) -> Self {
        self.pts = pts;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pts(&self) -> Option<Duration> {
        self.pts
    }

    /// Packed pixel bytes of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.format.row_bytes(self.width)]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }
}

use image::GrayImage;

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables are `(width + 1) x (height + 1)` with a zero first row and
/// column, so any rectangle sum takes four lookups.
pub struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq_sum = vec![0u64; stride * (h + 1)];

        for (y, row) in gray.as_raw().chunks_exact(w.max(1)).take(h).enumerate() {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for (x, &p) in row.iter().enumerate() {
                let p = p as u64;
                row_sum += p;
                row_sq += p * p;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sq_sum[at] = sq_sum[at - stride] + row_sq;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    /// Sum of pixels in the `w x h` block at `(x, y)`. The block must lie
    /// inside the image.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> u64 {
        Self::lookup(&self.sum, self.stride, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> u64 {
        Self::lookup(&self.sq_sum, self.stride, x, y, w, h)
    }

    fn lookup(table: &[u64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> u64 {
        let top = y * stride;
        let bottom = (y + h) * stride;
        table[bottom + x + w] + table[top + x] - table[top + x + w] - table[bottom + x]
    }
}

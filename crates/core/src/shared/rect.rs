/// An axis-aligned rectangle in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with the `[0, width) x [0, height)` image plane.
    ///
    /// Returns `None` when nothing of the rectangle lies inside.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        let clamped = Rect::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_empty()).then_some(clamped)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_edges_and_area() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
        assert_eq!(r.area(), 1200);
    }

    #[rstest]
    #[case::inside(Rect::new(10, 10, 20, 20), Some(Rect::new(10, 10, 20, 20)))]
    #[case::left_edge(Rect::new(-5, 10, 20, 20), Some(Rect::new(0, 10, 15, 20)))]
    #[case::bottom_right(Rect::new(90, 90, 20, 20), Some(Rect::new(90, 90, 10, 10)))]
    #[case::outside(Rect::new(120, 0, 10, 10), None)]
    #[case::degenerate(Rect::new(10, 10, 0, 5), None)]
    fn test_clamp_to(#[case] rect: Rect, #[case] expected: Option<Rect>) {
        assert_eq!(rect.clamp_to(100, 100), expected);
    }

    #[test]
    fn test_contains_point_is_half_open() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains_point(0, 0));
        assert!(r.contains_point(9, 9));
        assert!(!r.contains_point(10, 5));
    }
}

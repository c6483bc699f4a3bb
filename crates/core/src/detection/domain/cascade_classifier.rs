use image::GrayImage;

use crate::shared::constants::{DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR};
use crate::shared::rect::Rect;

/// Multi-scale search settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    /// Ratio between consecutive pyramid levels; must exceed 1.
    pub scale_factor: f64,
    /// Raw hits a group needs beyond the first before it is reported.
    /// Zero reports every raw hit ungrouped.
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub max_size: Option<(u32, u32)>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_FACE_SIZE,
            max_size: None,
        }
    }
}

/// Domain interface for a trained sliding-window object detector.
///
/// Identical input and params must yield identical output.
pub trait CascadeClassifier: Send {
    fn detect_multi_scale(
        &self,
        gray: &GrayImage,
        params: &DetectionParams,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>>;
}

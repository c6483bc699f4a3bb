use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::GrayImage;
use thiserror::Error;

use crate::detection::domain::cascade_classifier::{CascadeClassifier, DetectionParams};
use crate::detection::domain::rect_grouping::{group_rectangles, DEFAULT_GROUP_EPS};
use crate::detection::infrastructure::haar_cascade_loader;
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::shared::rect::Rect;

/// Windows whose pixel standard deviation does not exceed this are skipped.
pub const MIN_WINDOW_STDDEV: f64 = 10.0;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cascade is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("malformed cascade: {0}")]
    Malformed(String),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

/// One weighted rectangle of a Haar-like feature, in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Split node of a weak classifier tree.
///
/// `left` and `right` index further nodes when positive; zero or negative
/// values `-k` select leaf `k`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

/// Boosted cascade of Haar-like features (Viola-Jones), evaluated over an
/// image pyramid.
///
/// The image is shrunk by `scale_factor` per level while the window stays
/// at its trained size; hits are mapped back to source coordinates and
/// grouped.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Builds a cascade after checking that every index and rectangle is
    /// in range.
    pub fn new(
        window: (u32, u32),
        stages: Vec<Stage>,
        features: Vec<HaarFeature>,
    ) -> Result<Self, CascadeError> {
        let (ww, wh) = window;
        if ww < 3 || wh < 3 {
            return Err(CascadeError::Malformed(format!(
                "window {ww}x{wh} is too small"
            )));
        }
        if stages.is_empty() {
            return Err(CascadeError::Malformed("no stages".to_string()));
        }
        for (i, feature) in features.iter().enumerate() {
            if feature.rects.is_empty() {
                return Err(CascadeError::Malformed(format!("feature {i} has no rects")));
            }
            for r in &feature.rects {
                if r.x + r.width > ww || r.y + r.height > wh {
                    return Err(CascadeError::Malformed(format!(
                        "feature {i} rect leaves the {ww}x{wh} window"
                    )));
                }
            }
        }
        for (s, stage) in stages.iter().enumerate() {
            for (c, weak) in stage.classifiers.iter().enumerate() {
                validate_tree(weak, features.len())
                    .map_err(|e| CascadeError::Malformed(format!("stage {s} tree {c}: {e}")))?;
            }
        }
        Ok(Self {
            window,
            stages,
            features,
        })
    }

    /// Loads an OpenCV cascade XML file.
    pub fn from_file(path: &Path) -> Result<Self, CascadeError> {
        let xml = std::fs::read_to_string(path).map_err(|source| CascadeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        haar_cascade_loader::parse(&xml)
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Raw, ungrouped hits over the whole pyramid, in source coordinates.
    pub fn scan(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Rect> {
        let (img_w, img_h) = gray.dimensions();
        let (win_w, win_h) = self.window;
        let max_size = params.max_size.unwrap_or((img_w, img_h));
        let mut hits = Vec::new();

        let mut factor = 1.0f64;
        loop {
            let scaled_w = (img_w as f64 / factor).round() as u32;
            let scaled_h = (img_h as f64 / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            let found_w = (win_w as f64 * factor).round() as u32;
            let found_h = (win_h as f64 * factor).round() as u32;
            if found_w > max_size.0 || found_h > max_size.1 {
                break;
            }
            if found_w >= params.min_size.0 && found_h >= params.min_size.1 {
                let level = if factor == 1.0 {
                    IntegralImage::new(gray)
                } else {
                    let scaled =
                        image::imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle);
                    IntegralImage::new(&scaled)
                };
                self.scan_level(&level, (scaled_w, scaled_h), factor, &mut hits);
            }
            factor *= params.scale_factor;
        }

        hits
    }

    fn scan_level(
        &self,
        level: &IntegralImage,
        (scaled_w, scaled_h): (u32, u32),
        factor: f64,
        hits: &mut Vec<Rect>,
    ) {
        let (win_w, win_h) = self.window;
        let step = if factor > 2.0 { 1 } else { 2 };
        let found_w = (win_w as f64 * factor).round() as i32;
        let found_h = (win_h as f64 * factor).round() as i32;

        for y in (0..=scaled_h - win_h).step_by(step) {
            for x in (0..=scaled_w - win_w).step_by(step) {
                if self.accepts(level, x as usize, y as usize) {
                    hits.push(Rect::new(
                        (x as f64 * factor).round() as i32,
                        (y as f64 * factor).round() as i32,
                        found_w,
                        found_h,
                    ));
                }
            }
        }
    }

    /// Runs every stage on the window at `(x, y)`. Flat windows are
    /// rejected before any stage runs.
    fn accepts(&self, level: &IntegralImage, x: usize, y: usize) -> bool {
        let Some(inv_norm) = self.inverse_norm(level, x, y) else {
            return false;
        };

        self.stages.iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| self.evaluate_tree(weak, level, x, y, inv_norm))
                .sum();
            score >= stage.threshold
        })
    }

    /// Reciprocal of the window's standard deviation times its inner area,
    /// measured inside a one-pixel border.
    ///
    /// `None` when the standard deviation is at most [`MIN_WINDOW_STDDEV`],
    /// including perfectly flat windows.
    fn inverse_norm(&self, level: &IntegralImage, x: usize, y: usize) -> Option<f64> {
        let (win_w, win_h) = (self.window.0 as usize, self.window.1 as usize);
        let (nw, nh) = (win_w - 2, win_h - 2);
        let area = (nw * nh) as f64;
        let sum = level.rect_sum(x + 1, y + 1, nw, nh) as f64;
        let sq_sum = level.rect_sq_sum(x + 1, y + 1, nw, nh) as f64;
        let variance = area * sq_sum - sum * sum;
        let norm = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        let inv_norm = 1.0 / norm;
        (area * inv_norm < 1.0 / MIN_WINDOW_STDDEV).then_some(inv_norm)
    }

    fn evaluate_tree(
        &self,
        weak: &WeakClassifier,
        level: &IntegralImage,
        x: usize,
        y: usize,
        inv_norm: f64,
    ) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &weak.nodes[idx as usize];
            let value = self.feature_value(node.feature, level, x, y) * inv_norm;
            idx = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return weak.leaves[(-idx) as usize];
            }
        }
    }

    fn feature_value(&self, feature: usize, level: &IntegralImage, x: usize, y: usize) -> f64 {
        self.features[feature]
            .rects
            .iter()
            .map(|r| {
                let sum = level.rect_sum(
                    x + r.x as usize,
                    y + r.y as usize,
                    r.width as usize,
                    r.height as usize,
                );
                sum as f64 * r.weight
            })
            .sum()
    }
}

impl CascadeClassifier for HaarCascade {
    fn detect_multi_scale(
        &self,
        gray: &GrayImage,
        params: &DetectionParams,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
            return Err(format!("scale factor {} must exceed 1", params.scale_factor).into());
        }
        let hits = self.scan(gray, params);
        Ok(group_rectangles(&hits, params.min_neighbors, DEFAULT_GROUP_EPS))
    }
}

/// Every reachable node and leaf index must exist, and indices must move
/// forward so evaluation terminates.
fn validate_tree(weak: &WeakClassifier, feature_count: usize) -> Result<(), String> {
    if weak.nodes.is_empty() {
        return Err("no nodes".to_string());
    }
    for (i, node) in weak.nodes.iter().enumerate() {
        if node.feature >= feature_count {
            return Err(format!("feature index {} out of range", node.feature));
        }
        for child in [node.left, node.right] {
            if child > 0 {
                if child as usize >= weak.nodes.len() || child as usize <= i {
                    return Err(format!("node index {child} out of range"));
                }
            } else if (-child) as usize >= weak.leaves.len() {
                return Err(format!("leaf index {} out of range", -child));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A 24x24 single-stage cascade that fires when rows 4..8 of the
    /// window are darker than rows 8..12, the way the eye line sits above
    /// the cheeks.
    pub(crate) fn band_cascade() -> HaarCascade {
        let feature = HaarFeature {
            rects: vec![
                WeightedRect {
                    x: 4,
                    y: 4,
                    width: 16,
                    height: 8,
                    weight: -1.0,
                },
                WeightedRect {
                    x: 4,
                    y: 8,
                    width: 16,
                    height: 4,
                    weight: 2.0,
                },
            ],
        };
        let stage = Stage {
            threshold: 0.5,
            classifiers: vec![WeakClassifier {
                nodes: vec![TreeNode {
                    left: 0,
                    right: -1,
                    feature: 0,
                    threshold: 0.1,
                }],
                leaves: vec![0.0, 1.0],
            }],
        };
        HaarCascade::new((24, 24), vec![stage], vec![feature]).unwrap()
    }

    /// The band cascade with a node that also passes a zero feature
    /// response, so only window normalization can reject a flat image.
    pub(crate) fn permissive_cascade() -> HaarCascade {
        let mut cascade = band_cascade();
        cascade.stages[0].classifiers[0].nodes[0].threshold = -0.05;
        cascade
    }

    /// Light canvas crossed by one dark band.
    pub(crate) fn band_scene(w: u32, h: u32, band: Rect) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if band.contains_point(x as i32, y as i32) {
                image::Luma([40])
            } else {
                image::Luma([200])
            }
        })
    }

    pub(crate) fn intersects(a: &Rect, b: &Rect) -> bool {
        a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn params(min_neighbors: u32) -> DetectionParams {
        DetectionParams {
            min_neighbors,
            ..DetectionParams::default()
        }
    }

    #[test]
    fn test_uniform_image_has_no_hits() {
        let cascade = band_cascade();
        let gray = GrayImage::from_pixel(120, 90, image::Luma([128]));
        assert!(cascade.scan(&gray, &params(0)).is_empty());
    }

    fn whole_image(min_neighbors: u32) -> DetectionParams {
        DetectionParams {
            min_neighbors,
            min_size: (0, 0),
            ..DetectionParams::default()
        }
    }

    // ── Window normalization ──

    #[test]
    fn test_flat_frame_is_rejected_before_stages() {
        let cascade = permissive_cascade();
        let gray = GrayImage::from_pixel(64, 64, image::Luma([128]));
        let faces = cascade
            .detect_multi_scale(&gray, &DetectionParams::default())
            .unwrap();
        assert!(faces.is_empty(), "{faces:?}");
    }

    #[test]
    fn test_low_contrast_window_is_rejected() {
        let cascade = permissive_cascade();
        // Alternating 120/130 columns: standard deviation 5.
        let gray = GrayImage::from_fn(48, 48, |x, _| {
            image::Luma([if x % 2 == 0 { 120 } else { 130 }])
        });
        assert!(cascade.scan(&gray, &whole_image(0)).is_empty());
    }

    #[test]
    fn test_textured_window_reaches_the_stages() {
        let cascade = permissive_cascade();
        let gray = GrayImage::from_fn(24, 24, |x, _| {
            image::Luma([if x % 2 == 0 { 40 } else { 200 }])
        });
        assert_eq!(
            cascade.scan(&gray, &whole_image(0)),
            vec![Rect::new(0, 0, 24, 24)]
        );
    }

    // ── Scan range ──

    #[test]
    fn test_face_filling_the_frame_is_found() {
        let cascade = band_cascade();
        let gray = band_scene(24, 24, Rect::new(4, 4, 16, 4));
        let faces = cascade.detect_multi_scale(&gray, &whole_image(0)).unwrap();
        assert_eq!(faces, vec![Rect::new(0, 0, 24, 24)]);
    }

    #[test]
    fn test_last_column_of_positions_is_scanned() {
        let cascade = band_cascade();
        let gray = band_scene(26, 24, Rect::new(6, 4, 16, 4));
        let hits = cascade.scan(&gray, &whole_image(0));
        assert_eq!(hits, vec![Rect::new(0, 0, 24, 24), Rect::new(2, 0, 24, 24)]);
    }

    const BAND: Rect = Rect::new(50, 40, 40, 10);

    #[test]
    fn test_band_is_found_where_it_is() {
        let cascade = band_cascade();
        let gray = band_scene(160, 120, BAND);
        let faces = cascade.detect_multi_scale(&gray, &params(3)).unwrap();

        assert!(!faces.is_empty());
        let near_band = Rect::new(BAND.x - 4, BAND.y - 4, BAND.width + 8, BAND.height + 8);
        for face in &faces {
            assert!(face.width >= 30 && face.height >= 30);
            assert!(intersects(face, &near_band), "{face:?} is away from the band");
        }
    }

    #[test]
    fn test_inverted_band_is_not_found() {
        let cascade = band_cascade();
        // Light band on a dark canvas: the lower rows are never brighter.
        let gray = GrayImage::from_fn(160, 120, |x, y| {
            if BAND.contains_point(x as i32, y as i32) || y < BAND.y as u32 {
                image::Luma([200])
            } else {
                image::Luma([40])
            }
        });
        assert!(cascade.scan(&gray, &params(0)).is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let cascade = band_cascade();
        let gray = band_scene(160, 120, Rect::new(20, 30, 60, 12));
        let a = cascade.detect_multi_scale(&gray, &params(3)).unwrap();
        let b = cascade.detect_multi_scale(&gray, &params(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_min_size_filters_small_windows() {
        let cascade = band_cascade();
        let gray = band_scene(160, 120, BAND);
        let p = DetectionParams {
            min_neighbors: 0,
            min_size: (60, 60),
            ..DetectionParams::default()
        };
        assert!(cascade
            .scan(&gray, &p)
            .iter()
            .all(|r| r.width >= 60 && r.height >= 60));
    }

    #[test]
    fn test_max_size_bounds_the_pyramid() {
        let cascade = band_cascade();
        let gray = band_scene(160, 120, BAND);
        let p = DetectionParams {
            min_neighbors: 0,
            min_size: (0, 0),
            max_size: Some((30, 30)),
            ..DetectionParams::default()
        };
        assert!(cascade
            .scan(&gray, &p)
            .iter()
            .all(|r| r.width <= 30 && r.height <= 30));
    }

    #[test]
    fn test_image_smaller_than_window_yields_nothing() {
        let cascade = band_cascade();
        let gray = GrayImage::from_pixel(20, 20, image::Luma([0]));
        assert!(cascade.detect_multi_scale(&gray, &params(0)).unwrap().is_empty());
    }

    #[test]
    fn test_scale_factor_must_exceed_one() {
        let cascade = band_cascade();
        let gray = GrayImage::new(64, 64);
        let p = DetectionParams {
            scale_factor: 1.0,
            ..DetectionParams::default()
        };
        assert!(cascade.detect_multi_scale(&gray, &p).is_err());
    }

    #[test]
    fn test_new_rejects_out_of_range_feature() {
        let mut cascade = band_cascade();
        cascade.stages[0].classifiers[0].nodes[0].feature = 3;
        let HaarCascade {
            window,
            stages,
            features,
        } = cascade;
        assert!(matches!(
            HaarCascade::new(window, stages, features),
            Err(CascadeError::Malformed(_))
        ));
    }

    #[test]
    fn test_new_rejects_rect_outside_window() {
        let mut cascade = band_cascade();
        cascade.features[0].rects[0].x = 20;
        let HaarCascade {
            window,
            stages,
            features,
        } = cascade;
        assert!(HaarCascade::new(window, stages, features).is_err());
    }

    #[test]
    fn test_validate_tree_rejects_backward_node() {
        let weak = WeakClassifier {
            nodes: vec![
                TreeNode {
                    left: 1,
                    right: -1,
                    feature: 0,
                    threshold: 0.0,
                },
                TreeNode {
                    left: 1,
                    right: 0,
                    feature: 0,
                    threshold: 0.0,
                },
            ],
            leaves: vec![0.0, 1.0],
        };
        assert!(validate_tree(&weak, 1).is_err());
    }
}

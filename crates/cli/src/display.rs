use std::path::Path;
use std::sync::Arc;

use facecap_core::shared::constants::{MARKER_COLOR_BGR, MARKER_THICKNESS};
use facecap_core::shared::frame::Frame;
use facecap_core::shared::rect::Rect;
use facecap_core::video::domain::image_writer::ImageWriter;
use facecap_core::video::frame_adapter::{to_detection_buffer, to_display_image};

/// Headless stand-in for a video view.
///
/// Subscribes to captured frames directly and keeps the most recent one,
/// plus the face rectangles and count from the latest detection pass.
/// Outlines are drawn only when the view is rendered.
#[derive(Default)]
pub struct FrameDisplay {
    latest: Option<Arc<Frame>>,
    overlay: Vec<Rect>,
    frames_shown: u64,
    face_count: usize,
}

impl FrameDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, frame: Arc<Frame>) {
        self.latest = Some(frame);
        self.frames_shown += 1;
    }

    /// Replaces the outlines drawn over every following frame.
    pub fn set_overlay(&mut self, faces: Vec<Rect>) {
        self.overlay = faces;
    }

    pub fn overlay(&self) -> &[Rect] {
        &self.overlay
    }

    /// Returns true when the count differs from the one shown before.
    pub fn set_face_count(&mut self, count: usize) -> bool {
        let changed = self.face_count != count;
        self.face_count = count;
        changed
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.latest.as_deref()
    }

    /// The latest frame with the current overlay drawn on a copy.
    pub fn render(&self) -> Option<Frame> {
        let frame = self.latest.as_deref()?;
        let mut buffer = to_detection_buffer(frame);
        for rect in &self.overlay {
            buffer.draw_rectangle(rect, MARKER_COLOR_BGR, MARKER_THICKNESS);
        }
        Some(to_display_image(&buffer, frame.sequence()))
    }

    /// Writes the rendered view to `path`. Fails when nothing was shown.
    pub fn snapshot(
        &self,
        path: &Path,
        writer: &dyn ImageWriter,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let frame = self.render().ok_or("No frame to snapshot")?;
        writer.write(path, &frame)
    }

    /// Drops the latest frame and its overlay, like clearing the view
    /// after stop.
    pub fn clear(&mut self) {
        self.latest = None;
        self.overlay.clear();
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::detection::domain::cascade_classifier::{CascadeClassifier, DetectionParams};
use crate::detection::infrastructure::face_store::FaceStore;
use crate::detection::infrastructure::haar_cascade::HaarCascade;
use crate::shared::constants::{
    CASCADE_NAME, DEFAULT_OUTPUT_DIR, FACE_FILE_EXTENSION, MARKER_COLOR_BGR, MARKER_THICKNESS,
};
use crate::shared::detection_buffer::DetectionBuffer;
use crate::shared::event_bus::EventBus;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;
use crate::shared::resource_resolver::{default_search_dirs, resolve};
use crate::video::domain::image_writer::ImageWriter;
use crate::video::frame_adapter::{into_detection_buffer, to_detection_buffer, to_display_image};
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// File name of the cascade, looked up in `search_dirs` in order.
    pub cascade_name: String,
    pub search_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub extension: String,
    pub params: DetectionParams,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cascade_name: CASCADE_NAME.to_string(),
            search_dirs: default_search_dirs(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extension: FACE_FILE_EXTENSION.to_string(),
            params: DetectionParams::default(),
        }
    }
}

/// Published once per processed frame, including frames with no faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FacesDetected {
    pub frame_sequence: u64,
    pub count: usize,
}

/// Result of one detection pass.
#[derive(Debug)]
pub struct Detection {
    pub faces: Vec<Rect>,
    /// Paths of crops that were written; a failed save is skipped.
    pub saved: Vec<PathBuf>,
    /// The frame with markers drawn, in display channel order.
    pub annotated: Frame,
}

/// Finds faces in delivered frames, marks them, persists each crop and
/// reports how many were found.
///
/// Runs on the consuming thread, never on the streaming worker.
pub struct FaceDetector {
    classifier: Option<Box<dyn CascadeClassifier>>,
    params: DetectionParams,
    store: FaceStore,
    counts: EventBus<FacesDetected>,
}

impl FaceDetector {
    /// Loads the cascade named in `config` and writes crops as image files.
    ///
    /// A cascade that cannot be found or parsed is logged and leaves the
    /// detector running with zero detections per frame.
    pub fn new(config: &DetectorConfig) -> Self {
        let classifier = match load_cascade(config) {
            Ok(cascade) => Some(Box::new(cascade) as Box<dyn CascadeClassifier>),
            Err(e) => {
                log::error!("Could not load face cascade {}: {e}", config.cascade_name);
                None
            }
        };
        let store = FaceStore::new(
            config.output_dir.clone(),
            &config.extension,
            Box::new(ImageFileWriter::new()),
        );
        Self::with_classifier(classifier, config.params, store)
    }

    pub fn with_classifier(
        classifier: Option<Box<dyn CascadeClassifier>>,
        params: DetectionParams,
        store: FaceStore,
    ) -> Self {
        if classifier.is_none() {
            log::warn!("Face detection disabled, every frame will report zero faces");
        }
        Self {
            classifier,
            params,
            store,
            counts: EventBus::unbounded(),
        }
    }

    /// Same as [`FaceDetector::new`] but with a caller-provided image
    /// encoder.
    pub fn with_writer(config: &DetectorConfig, writer: Box<dyn ImageWriter>) -> Self {
        let mut detector = Self::new(config);
        detector.store = FaceStore::new(config.output_dir.clone(), &config.extension, writer);
        detector
    }

    pub fn is_degraded(&self) -> bool {
        self.classifier.is_none()
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn store(&self) -> &FaceStore {
        &self.store
    }

    /// Receiver for one [`FacesDetected`] event per processed frame.
    pub fn subscribe_counts(&self) -> Receiver<FacesDetected> {
        self.counts.subscribe()
    }

    /// Detects, crops, saves and marks faces in `frame`.
    ///
    /// Other holders of `frame` never observe the markers: a shared frame
    /// is copied, a uniquely held one is consumed.
    pub fn process_frame(&mut self, frame: Arc<Frame>) -> Detection {
        let sequence = frame.sequence();
        let mut buffer = match Arc::try_unwrap(frame) {
            Ok(owned) => into_detection_buffer(owned),
            Err(shared) => to_detection_buffer(&shared),
        };

        let faces = self.detect(&buffer);

        // Crops are taken before any marker is drawn so neighbouring
        // outlines do not bleed into them.
        let mut saved = Vec::with_capacity(faces.len());
        for rect in &faces {
            let Some(crop) = buffer.crop(rect) else {
                continue;
            };
            match self.store.save(&crop) {
                Ok(path) => saved.push(path),
                Err(e) => log::warn!("Failed to save face: {e}"),
            }
        }
        for rect in &faces {
            buffer.draw_rectangle(rect, MARKER_COLOR_BGR, MARKER_THICKNESS);
        }

        self.counts.publish(FacesDetected {
            frame_sequence: sequence,
            count: faces.len(),
        });
        if !faces.is_empty() {
            log::debug!("Frame {sequence}: {} face(s), {} saved", faces.len(), saved.len());
        }

        Detection {
            faces,
            saved,
            annotated: to_display_image(&buffer, sequence),
        }
    }

    fn detect(&self, buffer: &DetectionBuffer) -> Vec<Rect> {
        let Some(classifier) = &self.classifier else {
            return Vec::new();
        };
        let gray = buffer.to_gray();
        match classifier.detect_multi_scale(&gray, &self.params) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                Vec::new()
            }
        }
    }
}

fn load_cascade(config: &DetectorConfig) -> Result<HaarCascade, Box<dyn std::error::Error>> {
    let path = resolve(&config.cascade_name, &config.search_dirs)?;
    let cascade = HaarCascade::from_file(&path)?;
    log::info!(
        "Loaded face cascade {} ({} stages)",
        path.display(),
        cascade.stage_count()
    );
    Ok(cascade)
}

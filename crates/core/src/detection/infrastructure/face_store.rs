use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

use crate::shared::constants::FACE_FILE_PREFIX;
use crate::shared::detection_buffer::DetectionBuffer;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::frame_adapter::to_display_image;

#[derive(Error, Debug)]
pub enum FaceStoreError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Persists cropped faces as `face_<yyyyMMdd_HHmmss>_<counter>.<ext>`.
///
/// The counter belongs to this store and advances on every save attempt,
/// successful or not, so names never repeat within one store even when
/// many faces land in the same second.
pub struct FaceStore {
    output_dir: PathBuf,
    extension: String,
    counter: u64,
    writer: Box<dyn ImageWriter>,
}

impl FaceStore {
    pub fn new(output_dir: impl Into<PathBuf>, extension: &str, writer: Box<dyn ImageWriter>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
            counter: 0,
            writer,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of save attempts so far.
    pub fn saved_count(&self) -> u64 {
        self.counter
    }

    pub fn save(&mut self, crop: &DetectionBuffer) -> Result<PathBuf, FaceStoreError> {
        self.save_at(crop, Local::now().naive_local())
    }

    pub fn save_at(
        &mut self,
        crop: &DetectionBuffer,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf, FaceStoreError> {
        let counter = self.counter;
        self.counter += 1;

        self.ensure_output_dir()?;
        let path = self
            .output_dir
            .join(face_file_name(timestamp, counter, &self.extension));
        let image = to_display_image(crop, counter);
        self.writer
            .write(&path, &image)
            .map_err(|e| FaceStoreError::Write {
                path: path.clone(),
                message: e.to_string(),
            })?;
        log::debug!("Saved face {}", path.display());
        Ok(path)
    }

    fn ensure_output_dir(&self) -> Result<(), FaceStoreError> {
        if self.output_dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|source| FaceStoreError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;
        log::info!("Created output directory {}", self.output_dir.display());
        Ok(())
    }
}

pub fn face_file_name(timestamp: NaiveDateTime, counter: u64, extension: &str) -> String {
    format!(
        "{FACE_FILE_PREFIX}_{}_{counter}.{extension}",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facecap_core::shared::constants::{
    DEFAULT_FRAME_QUEUE_CAPACITY, DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS,
    DEFAULT_OUTPUT_DIR, DEFAULT_SCALE_FACTOR,
};

/// Persisted defaults for a capture session. Command-line flags override
/// individual fields for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device index or video file path.
    pub source: String,
    pub output_dir: PathBuf,
    /// Explicit cascade file; the bundled name is searched for when unset.
    pub cascade: Option<PathBuf>,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub queue_capacity: usize,
    pub sync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cascade: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_FACE_SIZE,
            queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
            sync: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCapture").join("settings.json"))
    }

    /// Settings from the user config file, or defaults when it is missing
    /// or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring invalid settings file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("No user config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resource {name} not found in any of {searched:?}")]
    NotFound { name: String, searched: Vec<PathBuf> },
}

/// Resolve a bundled resource file by name.
///
/// Returns the first `dir/name` that exists, in the given order.
pub fn resolve(name: &str, search_dirs: &[PathBuf]) -> Result<PathBuf, ResolveError> {
    search_dirs
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
            searched: search_dirs.to_vec(),
        })
}

/// Default lookup order for resource files:
///
/// 1. Current working directory
/// 2. Directory of the running executable
/// 3. User data directory (`<data_dir>/FaceCapture/`)
/// 4. System OpenCV cascade directories
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs_out.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
    {
        dirs_out.push(exe_dir.to_path_buf());
    }
    if let Some(data) = user_data_dir() {
        dirs_out.push(data);
    }
    for system in [
        "/usr/share/opencv4/haarcascades",
        "/usr/local/share/opencv4/haarcascades",
        "/usr/share/opencv/haarcascades",
    ] {
        dirs_out.push(PathBuf::from(system));
    }

    dirs_out
}

/// Per-user directory for installed resources.
///
/// - macOS: `~/Library/Application Support/FaceCapture/`
/// - Linux: `$XDG_DATA_HOME/FaceCapture/` or `~/.local/share/FaceCapture/`
/// - Windows: `%APPDATA%/FaceCapture/`
pub fn user_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("FaceCapture"))
}

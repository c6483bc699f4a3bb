use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::pipeline::pipeline_error::PipelineError;

/// What the pipeline reads from.
///
/// A descriptor made only of ASCII digits names a capture device by index;
/// anything else is treated as a path to a container file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    Device(u32),
    File(PathBuf),
}

impl SourceDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, PipelineError> {
        let trimmed = descriptor.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::InvalidSource {
                descriptor: descriptor.to_string(),
                reason: "descriptor is empty",
            });
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<u32>()
                .map(SourceDescriptor::Device)
                .map_err(|_| PipelineError::InvalidSource {
                    descriptor: descriptor.to_string(),
                    reason: "device index out of range",
                });
        }
        Ok(SourceDescriptor::File(PathBuf::from(descriptor)))
    }

    pub fn is_device(&self) -> bool {
        matches!(self, SourceDescriptor::Device(_))
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            SourceDescriptor::File(path) => Some(path),
            SourceDescriptor::Device(_) => None,
        }
    }
}

impl FromStr for SourceDescriptor {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Device(index) => write!(f, "device {index}"),
            SourceDescriptor::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

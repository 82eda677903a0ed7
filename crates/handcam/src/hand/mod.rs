//! Hand detection and landmark tracking.
//!
//! Hands are found in two stages, using the MediaPipe palm detection and hand landmark networks:
//! the [`detection`] network locates palms in the full frame, and the [`landmark`] network
//! estimates 21 keypoints inside a region of interest derived from each palm. [`tracking`]
//! combines both into a tracker that only runs palm detection while hands are missing.

use std::{
    fmt,
    path::{Path, PathBuf},
};

pub mod detection;
pub mod landmark;
pub mod style;
pub mod tracking;

/// Directory the ONNX networks are loaded from unless configured otherwise.
pub const DEFAULT_MODEL_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../3rdparty/onnx");

/// Selects between the lightweight and the more accurate variant of both hand networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelComplexity {
    /// `palm_detection_lite.onnx` and `hand_landmark_lite.onnx`.
    #[default]
    Lite,
    /// `palm_detection_full.onnx` and `hand_landmark_full.onnx`.
    Full,
}

impl ModelComplexity {
    fn file_suffix(self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Full => "full",
        }
    }

    /// Returns the path of the network called `stem` in `model_dir`.
    pub(crate) fn model_path(self, model_dir: &Path, stem: &str) -> PathBuf {
        model_dir.join(format!("{stem}_{}.onnx", self.file_suffix()))
    }
}

impl TryFrom<u8> for ModelComplexity {
    type Error = anyhow::Error;

    fn try_from(level: u8) -> anyhow::Result<Self> {
        match level {
            0 => Ok(Self::Lite),
            1 => Ok(Self::Full),
            _ => anyhow::bail!("invalid model complexity {level} (expected 0 or 1)"),
        }
    }
}

impl fmt::Display for ModelComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_levels() {
        assert_eq!(ModelComplexity::try_from(0).unwrap(), ModelComplexity::Lite);
        assert_eq!(ModelComplexity::try_from(1).unwrap(), ModelComplexity::Full);
        assert!(ModelComplexity::try_from(2).is_err());
    }

    #[test]
    fn model_paths() {
        let dir = Path::new("/models");
        assert_eq!(
            ModelComplexity::Lite.model_path(dir, "palm_detection"),
            Path::new("/models/palm_detection_lite.onnx")
        );
        assert_eq!(
            ModelComplexity::Full.model_path(dir, "hand_landmark"),
            Path::new("/models/hand_landmark_full.onnx")
        );
    }
}

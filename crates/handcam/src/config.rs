//! Runtime configuration.
//!
//! There are no command-line arguments. [`Settings::from_env`] starts from the defaults and
//! applies the `HANDCAM_*` environment variables listed in the crate documentation.

use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::Context;

use crate::hand::{tracking::HandTracker, ModelComplexity, DEFAULT_MODEL_DIR};

const ENV_CAMERA: &str = "HANDCAM_CAMERA";
const ENV_FPS: &str = "HANDCAM_FPS";
const ENV_MODEL_DIR: &str = "HANDCAM_MODEL_DIR";
const ENV_MODEL_COMPLEXITY: &str = "HANDCAM_MODEL_COMPLEXITY";
const ENV_MAX_HANDS: &str = "HANDCAM_MAX_HANDS";
const ENV_MIN_DETECTION_CONFIDENCE: &str = "HANDCAM_MIN_DETECTION_CONFIDENCE";
const ENV_MIN_TRACKING_CONFIDENCE: &str = "HANDCAM_MIN_TRACKING_CONFIDENCE";
const ENV_MIRROR: &str = "HANDCAM_MIRROR";

/// Hand detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HandsOptions {
    /// 0 selects the lite networks, 1 the full networks.
    pub model_complexity: u8,
    /// Maximum number of hands to track at once.
    pub max_num_hands: usize,
    /// Minimum palm detection confidence for a new hand to be picked up.
    pub min_detection_confidence: f32,
    /// Minimum hand presence score for a tracked hand to be kept.
    pub min_tracking_confidence: f32,
}

impl Default for HandsOptions {
    fn default() -> Self {
        Self {
            model_complexity: 0,
            max_num_hands: HandTracker::DEFAULT_MAX_HANDS,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl HandsOptions {
    /// Checks that all parameters are in their valid ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.complexity()?;
        if self.max_num_hands == 0 {
            anyhow::bail!("maximum number of hands must be at least 1");
        }
        check_confidence("minimum detection confidence", self.min_detection_confidence)?;
        check_confidence("minimum tracking confidence", self.min_tracking_confidence)?;
        Ok(())
    }

    /// Returns the network variant selected by `model_complexity`.
    pub fn complexity(&self) -> anyhow::Result<ModelComplexity> {
        ModelComplexity::try_from(self.model_complexity)
    }
}

fn check_confidence(what: &str, value: f32) -> anyhow::Result<()> {
    // Also rejects NaN.
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{what} must be between 0 and 1, got {value}");
    }
    Ok(())
}

/// Settings for one run of the hand detection loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Index of the V4L2 capture device (`/dev/video{camera}`).
    pub camera: u32,
    /// Minimum capture frame rate. The highest resolution the camera delivers at this rate is
    /// used.
    pub fps: u32,
    /// Directory containing the palm detection and hand landmark networks.
    pub model_dir: PathBuf,
    pub hands: HandsOptions,
    pub window_title: String,
    /// Whether to mirror the displayed image, which feels natural for a front-facing camera.
    pub mirror: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: 0,
            fps: 30,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            hands: HandsOptions::default(),
            window_title: String::from("Hand Detector"),
            mirror: true,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads settings using `lookup` to retrieve the value of each variable.
    ///
    /// Unset variables keep their default value. Malformed or out-of-range values are an error.
    pub fn from_lookup<F>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let mut var = |name: &'static str| lookup(name).map(|value| (name, value));

        if let Some((name, value)) = var(ENV_CAMERA) {
            settings.camera = parse(name, &value)?;
        }
        if let Some((name, value)) = var(ENV_FPS) {
            settings.fps = parse(name, &value)?;
            if settings.fps == 0 {
                anyhow::bail!("`{name}` must be at least 1");
            }
        }
        if let Some((_, value)) = var(ENV_MODEL_DIR) {
            settings.model_dir = PathBuf::from(value);
        }
        if let Some((name, value)) = var(ENV_MODEL_COMPLEXITY) {
            settings.hands.model_complexity = parse(name, &value)?;
        }
        if let Some((name, value)) = var(ENV_MAX_HANDS) {
            settings.hands.max_num_hands = parse(name, &value)?;
        }
        if let Some((name, value)) = var(ENV_MIN_DETECTION_CONFIDENCE) {
            settings.hands.min_detection_confidence = parse(name, &value)?;
        }
        if let Some((name, value)) = var(ENV_MIN_TRACKING_CONFIDENCE) {
            settings.hands.min_tracking_confidence = parse(name, &value)?;
        }
        if let Some((name, value)) = var(ENV_MIRROR) {
            settings.mirror = parse_bool(name, &value)?;
        }

        settings
            .hands
            .validate()
            .context("invalid hand detection settings")?;
        Ok(settings)
    }
}

fn parse<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value '{value}' for `{name}`: {e}"))
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid value '{value}' for `{name}`: expected 0 or 1"),
    }
}

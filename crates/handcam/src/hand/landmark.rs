//! Hand landmark prediction.

use std::path::Path;

use nalgebra::{Point3, Rotation2, Vector2};

use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

use super::ModelComplexity;

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// The MediaPipe hand landmark network (224x224 input).
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads `hand_landmark_{lite,full}.onnx` from `model_dir`.
    pub fn load(model_dir: &Path, complexity: ModelComplexity) -> anyhow::Result<Self> {
        let path = complexity.model_path(model_dir, "hand_landmark");
        log::debug!("loading hand landmark network from {}", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::load(&path)?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self::from_cnn(cnn))
    }

    /// Uses `cnn`, whose outputs must be laid out like those of the MediaPipe network.
    pub fn from_cnn(cnn: Cnn) -> Self {
        Self { cnn }
    }
}

impl Network for LandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

/// Output shapes: screen landmarks, hand presence, handedness and world landmarks.
const OUTPUT_SHAPES: [&[usize]; 4] = [&[1, 63], &[1, 1], &[1, 1], &[1, 63]];

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    let shapes: Vec<&[usize]> = (0..outputs.len()).map(|i| outputs[i].shape()).collect();
    if shapes != OUTPUT_SHAPES {
        anyhow::bail!("hand landmark network has unexpected output shapes {shapes:?}");
    }

    estimate.presence = outputs[1].index([0, 0]).as_singular();
    estimate.raw_handedness = outputs[2].index([0, 0]).as_singular();

    // World landmarks (output 3) are metric and not needed for drawing.
    let coords = outputs[0].index([0]).as_slice().chunks_exact(3);
    for (pos, xyz) in zip_exact(estimate.landmarks.positions_mut(), coords) {
        *pos = Point3::from_slice(xyz);
    }

    Ok(())
}

/// Landmark results estimated by [`LandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns a landmark's position in the input image's coordinate system.
    pub fn landmark_position(&self, index: LandmarkIdx) -> Point3<f32> {
        self.landmarks.positions()[index as usize]
    }

    /// Returns an iterator over the landmarks that surround the palm.
    pub fn palm_landmarks(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        PALM_LANDMARKS
            .iter()
            .map(|&idx| self.landmark_position(idx))
    }

    /// Computes the center position of the hand's palm by averaging the palm landmarks.
    pub fn palm_center(&self) -> Point3<f32> {
        let sum = self
            .palm_landmarks()
            .fold(Point3::origin(), |acc, lm| acc + lm.coords);
        sum / PALM_LANDMARKS.len() as f32
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that fingers are pointed upwards.
    pub fn rotation_radians(&self) -> f32 {
        let finger = self.landmark_position(LandmarkIdx::MiddleFingerMcp).xy();
        let wrist = self.landmark_position(LandmarkIdx::Wrist).xy();
        Rotation2::rotation_between(&Vector2::y(), &(wrist - finger)).angle()
    }

    /// Returns the hand presence score reported by the network.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    pub fn raw_handedness(&self) -> f32 {
        self.raw_handedness
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This assumes that the camera image is passed in as-is (not mirrored), and should only be
    /// relied on when the presence is above the tracking threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn angle_radians(&self) -> Option<f32> {
        Some(self.rotation_radians())
    }
}

impl Confidence for LandmarkResult {
    #[inline]
    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The 21 hand landmarks, numbered in network output order.
///
/// Joints are named from the wrist outwards: CMC (thumb base), MCP (knuckle), PIP, DIP and the
/// fingertip. The thumb has an IP joint instead of PIP and DIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkIdx {
    /// All landmarks, in network output order.
    pub const ALL: [Self; NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        [
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };
}

/// Landmarks that surround the palm.
pub const PALM_LANDMARKS: &[LandmarkIdx] = {
    use LandmarkIdx::*;
    &[
        Wrist,
        ThumbCmc,
        IndexFingerMcp,
        MiddleFingerMcp,
        RingFingerMcp,
        PinkyMcp,
    ]
};

/// Pairs of landmarks that form the hand skeleton.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (Wrist, PinkyMcp),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::nn::tensor::Tensor;

    use super::*;

    fn outputs(presence: f32, handedness: f32) -> Outputs {
        [
            Tensor::from_iter(&[1, 63], (0..63).map(|i| i as f32)),
            Tensor::from_iter(&[1, 1], [presence]),
            Tensor::from_iter(&[1, 1], [handedness]),
            Tensor::from_iter(&[1, 63], [0.0; 63]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn extract_landmarks() {
        let mut result = LandmarkResult::default();
        extract(&outputs(0.9, 0.8), &mut result).unwrap();

        assert_eq!(result.confidence(), 0.9);
        assert_eq!(result.handedness(), Handedness::Right);
        assert_eq!(
            result.landmark_position(LandmarkIdx::Wrist),
            Point3::new(0.0, 1.0, 2.0)
        );
        assert_eq!(
            result.landmark_position(LandmarkIdx::PinkyTip),
            Point3::new(60.0, 61.0, 62.0)
        );

        extract(&outputs(0.1, 0.2), &mut result).unwrap();
        assert_eq!(result.handedness(), Handedness::Left);
    }

    #[test]
    fn extract_rejects_wrong_shapes() {
        let mut result = LandmarkResult::default();
        let outputs: Outputs = [
            Tensor::from_iter(&[1, 42], [0.0; 42]),
            Tensor::from_iter(&[1, 1], [0.0]),
            Tensor::from_iter(&[1, 1], [0.0]),
            Tensor::from_iter(&[1, 63], [0.0; 63]),
        ]
        .into_iter()
        .collect();
        assert!(extract(&outputs, &mut result).is_err());
    }

    #[test]
    fn landmark_order() {
        for (i, idx) in LandmarkIdx::ALL.iter().enumerate() {
            assert_eq!(*idx as usize, i);
        }
    }

    #[test]
    fn connectivity_covers_all_landmarks() {
        let mut seen = [false; NUM_LANDMARKS];
        for &(a, b) in CONNECTIVITY {
            seen[a as usize] = true;
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(CONNECTIVITY.len(), 21);
    }

    #[test]
    fn rotation_and_palm_center() {
        let mut result = LandmarkResult::default();
        for idx in PALM_LANDMARKS {
            result.landmarks.positions_mut()[*idx as usize] = Point3::new(6.0, 0.0, 0.0);
        }
        result.landmarks.positions_mut()[LandmarkIdx::Wrist as usize] = Point3::new(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(result.palm_center(), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-6);

        // Wrist left of the middle finger: fingers point to the right.
        assert_abs_diff_eq!(
            result.rotation_radians(),
            std::f32::consts::FRAC_PI_2,
            epsilon = 1e-6
        );
    }
}

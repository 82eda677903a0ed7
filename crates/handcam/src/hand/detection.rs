//! Palm detection.

use std::path::Path;

use nalgebra::{Point2, Rotation2, Vector2};

use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Network,
};
use crate::image::{Rect, Resolution, RotatedRect};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

use super::ModelComplexity;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;

/// Values per anchor in the box output: center, size, then X/Y of every keypoint.
const BOX_PARAMS: usize = 4 + 2 * NUM_KEYPOINTS;

const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// The MediaPipe palm detection network (192x192 input).
///
/// Both variants share the anchor layout; the full network is slower but detects hands further
/// away from the camera.
pub struct PalmNetwork {
    cnn: Cnn,
    anchors: Anchors,
}

impl PalmNetwork {
    /// Loads `palm_detection_{lite,full}.onnx` from `model_dir`.
    pub fn load(model_dir: &Path, complexity: ModelComplexity) -> anyhow::Result<Self> {
        let path = complexity.model_path(model_dir, "palm_detection");
        log::debug!("loading palm detection network from {}", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::load(&path)?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(LAYERS),
        })
    }
}

impl Network for PalmNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            &self.anchors,
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

fn extract_outputs(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    if outputs.len() != 2 {
        anyhow::bail!("palm detection network must have 2 outputs, got {}", outputs.len());
    }

    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];
    if boxes.shape() != [1, num_anchors, BOX_PARAMS] || confidences.shape() != [1, num_anchors, 1] {
        anyhow::bail!(
            "unexpected palm detection output shapes {:?} and {:?}",
            boxes.shape(),
            confidences.shape(),
        );
    }

    for index in 0..num_anchors {
        let conf = sigmoid(confidences.index([0, index, 0]).as_singular());
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            box_params,
            conf,
        ));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let offset = Vector2::new(
        anchor.x_center() * input_res.width() as f32,
        anchor.y_center() * input_res.height() as f32,
    );

    let rect = Rect::from_center(
        box_params[0] + offset.x,
        box_params[1] + offset.y,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| Point2::new(xy[0], xy[1]) + offset)
        .collect();

    let mut det = Detection::with_keypoints(confidence, rect, keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Computes the clockwise rotation of a palm from the wrist and middle finger keypoints.
///
/// A rotation of 0° means that the fingers point upwards.
fn palm_angle(det: &Detection) -> f32 {
    let finger = det.keypoints()[Keypoint::MiddleFingerMcp as usize];
    let wrist = det.keypoints()[Keypoint::Wrist as usize];
    Rotation2::rotation_between(&Vector2::y(), &(wrist - finger)).angle()
}

/// Relative amount the RoI is shifted from the palm towards the fingers.
const ROI_SHIFT: f32 = 0.5;

/// Size of the hand RoI relative to the palm's longer side.
const ROI_SCALE: f32 = 2.6;

/// Derives the region of interest of the whole hand from a palm detection.
///
/// The palm rectangle is rotated by the palm angle, moved towards the fingers, made square and
/// enlarged to contain the fingers.
pub fn hand_roi(palm: &Detection) -> RotatedRect {
    let rect = palm.bounding_rect();
    let angle = palm.angle();
    let shift = Rotation2::new(angle) * Vector2::new(0.0, -ROI_SHIFT * rect.height());
    let rect = rect.move_by(shift).square_long().scale(ROI_SCALE);
    RotatedRect::new(rect, angle)
}

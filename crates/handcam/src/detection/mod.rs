//! Single-class object detection on top of a [`Cnn`].
//!
//! [`Detector`] handles everything around the network: letterboxing the input, thresholding,
//! [non-maximum suppression](nms) and mapping results back to image coordinates. The palm
//! detector in [`crate::hand::detection`] plugs its network in through [`Network`].

pub mod nms;
pub mod ssd;

use anyhow::anyhow;
use nalgebra::{Point2, Vector2};

use crate::image::{AsImageView, ImageView, Rect, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// A detection network.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs`, appending every detection scoring at least `threshold` to `detections`.
    ///
    /// Positions are in network input pixels.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

pub struct Detector {
    network: Box<dyn Network>,
    thresh: f32,
    nms: NonMaxSuppression,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
            detections: Vec::new(),
            t_infer: Timer::new("detect"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Detections scoring below `thresh` are dropped before suppression.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    pub fn nms_mut(&mut self) -> &mut NonMaxSuppression {
        &mut self.nms
    }

    /// Detects objects in `image`.
    ///
    /// Detections are in `image` coordinates, most confident first.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_view(image.as_view())
    }

    fn detect_view(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        // Pixels of the letterboxed area outside of `image` read as black.
        let area = letterbox(image.rect(), input_res)?;
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(area)))?;
        log::trace!("detection network outputs: {:?}", outputs);

        self.detections.clear();
        let (network, thresh, detections) = (&self.network, self.thresh, &mut self.detections);
        self.t_extract
            .time(|| network.extract(&outputs, thresh, detections))?;
        self.t_nms.time(|| self.nms.process(&mut self.detections));

        let scale = area.width() / input_res.width() as f32;
        for det in &mut self.detections {
            det.transform(scale, area.top_left());
        }
        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// Extends `rect` around its center to the aspect ratio of a network input of `input_res`.
pub(crate) fn letterbox(rect: Rect, input_res: Resolution) -> anyhow::Result<Rect> {
    let aspect = input_res
        .aspect_ratio()
        .ok_or_else(|| anyhow!("network input resolution {input_res} is empty"))?;
    Ok(rect.grow_to_fit_aspect(aspect))
}

/// An object found by a [`Detector`].
///
/// Confidences are expected in `0.0..=1.0` (see [`crate::num::sigmoid`]), since non-maximum
/// averaging uses them as weights.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Point2<f32>>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Point2<f32>>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clockwise rotation of the object in radians. 0.0 unless the network estimates it.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Network-specific keypoints of the object.
    pub fn keypoints(&self) -> &[Point2<f32>] {
        &self.keypoints
    }

    /// Scales all positions by `scale`, then moves them by `offset`.
    fn transform(&mut self, scale: f32, offset: Vector2<f32>) {
        let center = self.rect.center() * scale + offset;
        let size = self.rect.size() * scale;
        self.rect = Rect::from_center(center.x, center.y, size.x, size.y);
        self.keypoints
            .iter_mut()
            .for_each(|kp| *kp = *kp * scale + offset);
    }
}

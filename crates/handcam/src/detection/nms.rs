//! Suppression of overlapping detections.
//!
//! SSD networks report each object many times, from neighboring anchors. Non-maximum suppression
//! keeps one detection per cluster of overlapping ones. In [`SuppressionMode::Average`] (the
//! default) that detection is the confidence-weighted mean of the cluster, which jitters less
//! from frame to frame than picking the best one ([`SuppressionMode::Remove`]).

use nalgebra::{Point2, Vector2};

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::Detection;

/// What happens to detections overlapping a more confident one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// They are discarded.
    Remove,
    /// They are merged into it.
    Average,
}

pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// Detections whose IoU reaches this value overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Replaces `detections` with one detection per cluster, most confident first.
    pub fn process(&self, detections: &mut Vec<Detection>) {
        let mut pending = std::mem::take(detections);
        pending.sort_unstable_by_key(|det| std::cmp::Reverse(TotalF32(det.confidence)));

        let mut pending = pending.into_iter();
        while let Some(best) = pending.next() {
            let rect = best.bounding_rect();
            let (cluster, rest): (Vec<_>, Vec<_>) = pending
                .partition(|det| rect.iou(&det.bounding_rect()) >= self.iou_thresh);

            detections.push(match self.mode {
                SuppressionMode::Remove => best,
                SuppressionMode::Average => average(best, &cluster),
            });
            pending = rest.into_iter();
        }
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence-weighted mean of `best` and `cluster`, with the confidence of `best`.
fn average(best: Detection, cluster: &[Detection]) -> Detection {
    let members = || std::iter::once(&best).chain(cluster);
    let total: f32 = members().map(|det| det.confidence).sum();
    // Also catches NaN.
    if cluster.is_empty() || !(total > 0.0) {
        return best;
    }

    let mut center = Vector2::zeros();
    let mut size = Vector2::zeros();
    let mut heading = Vector2::zeros();
    let mut keypoints = vec![Point2::origin(); best.keypoints.len()];
    for det in members() {
        let weight = det.confidence;
        let rect = det.bounding_rect();
        center += rect.center() * weight;
        size += rect.size() * weight;
        // Angles are summed as unit vectors, so that they wrap around at ±π.
        heading += Vector2::new(det.angle.cos(), det.angle.sin()) * weight;
        for (sum, kp) in zip_exact(&mut keypoints, &det.keypoints) {
            *sum += kp.coords * weight;
        }
    }

    center /= total;
    size /= total;
    keypoints.iter_mut().for_each(|kp| *kp /= total);

    let rect = Rect::from_center(center.x, center.y, size.x, size.y);
    let mut merged = Detection::with_keypoints(best.confidence, rect, keypoints);
    if heading != Vector2::zeros() {
        merged.set_angle(heading.y.atan2(heading.x));
    } else {
        merged.set_angle(best.angle);
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::new(0.55, rect.scale(1.5)),
            Detection::new(0.6, rect),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(d.bounding_rect(), rect);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let nms = NonMaxSuppression::new();

        let mut detections = vec![
            Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0)),
            Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0)),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 2);
        // highest confidence first
        assert_eq!(detections[0].confidence(), 0.9);
        assert_eq!(detections[1].bounding_rect().center().x, 0.0);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::with_keypoints(1.0, rect, vec![Point2::new(0.0, 0.0)]),
            Detection::with_keypoints(0.5, rect.scale(4.0), vec![Point2::new(3.0, 6.0)]),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(rect.center().x, -1.0);
        assert_eq!(rect.center().y, 3.0);
        assert_eq!(rect.width(), 2.0);
        assert_eq!(rect.height(), 2.0);
        assert_eq!(d.keypoints()[0], Point2::new(1.0, 2.0));
    }

    #[test]
    fn empty_input() {
        let mut detections = Vec::new();
        NonMaxSuppression::new().process(&mut detections);
        assert!(detections.is_empty());
    }

    fn angled(confidence: f32, angle: f32) -> Detection {
        let mut det = Detection::new(confidence, Rect::from_center(0.0, 0.0, 2.0, 2.0));
        det.set_angle(angle);
        det
    }

    #[test]
    fn averages_angles() {
        let mut detections = vec![angled(0.8, 0.2), angled(0.8, 0.4)];
        NonMaxSuppression::new().process(&mut detections);
        assert_eq!(detections.len(), 1);
        assert_abs_diff_eq!(detections[0].angle(), 0.3, epsilon = 1e-5);
    }

    #[test]
    fn averages_angles_across_wraparound() {
        // Both point almost straight down, on either side of ±π.
        let mut detections = vec![angled(0.9, PI - 0.05), angled(0.9, -PI + 0.05)];
        NonMaxSuppression::new().process(&mut detections);
        assert_eq!(detections.len(), 1);
        assert_abs_diff_eq!(detections[0].angle().abs(), PI, epsilon = 1e-4);
    }

    #[test]
    fn zero_confidence_cluster_keeps_best() {
        let rect = Rect::from_center(1.0, 1.0, 2.0, 2.0);
        let mut detections = vec![
            Detection::with_keypoints(0.0, rect, vec![Point2::new(1.0, 1.0)]),
            Detection::with_keypoints(0.0, rect.scale(1.2), vec![Point2::new(2.0, 2.0)]),
        ];
        NonMaxSuppression::new().process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert!(d.bounding_rect().center().iter().all(|v| v.is_finite()));
        assert!(d.keypoints().iter().all(|kp| kp.x.is_finite() && kp.y.is_finite()));
    }
}

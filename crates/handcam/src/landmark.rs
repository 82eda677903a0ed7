//! Landmark estimation and tracking shared by the landmark networks.
//!
//! [`Estimator`] runs a [`Network`] on an image. [`LandmarkTracker`] follows one object from
//! frame to frame: it crops a rotated region of interest around the object, estimates landmarks
//! inside it, and derives next frame's region from those landmarks.

use nalgebra::{Point3, Vector2};

use crate::detection::letterbox;
use crate::image::{AsImageView, AspectRatio, ImageView, Resolution, RotatedRect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

/// 3D landmark positions, a fixed number per network.
///
/// X and Y are pixels of the image the landmarks were estimated on. Z is a relative depth whose
/// scale depends on the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks(Box<[Point3<f32>]>);

impl Landmarks {
    /// `len` landmarks, all at the origin.
    pub fn new(len: usize) -> Self {
        Self(vec![Point3::origin(); len].into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark(self.0[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.0.iter().copied().map(Landmark)
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.0
    }

    pub fn positions_mut(&mut self) -> &mut [Point3<f32>] {
        &mut self.0
    }

    /// Replaces every position `p` with `f(p)`.
    pub fn map_positions(&mut self, mut f: impl FnMut(Point3<f32>) -> Point3<f32>) {
        self.0.iter_mut().for_each(|p| *p = f(*p));
    }
}

/// One entry of [`Landmarks`].
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark(Point3<f32>);

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Point3::new(x, y, z))
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.0.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.0.y
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.0.z
    }

    #[inline]
    pub fn xy(&self) -> Vector2<f32> {
        Vector2::new(self.0.x, self.0.y)
    }
}

/// Output of a landmark [`Network`], reused across [`Estimator::estimate`] calls.
pub trait Estimate: Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Clockwise rotation of the object in radians, if the network estimates one.
    ///
    /// [`LandmarkTracker`] turns its region of interest by this angle so the object appears
    /// upright in the next frame's crop.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

/// Presence score of the tracked object, usually in `0.0..=1.0`.
pub trait Confidence {
    fn confidence(&self) -> f32;
}

/// A neural network that estimates landmarks.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` into `estimate`, with positions in network input pixels.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Runs a landmark [`Network`] and maps its results back onto the input image.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks on `image`, returning them in `image` coordinates.
    ///
    /// `image` is letterboxed to the network's aspect ratio, pulling in surrounding pixels of
    /// the underlying image where there are any.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_view(image.as_view())
    }

    fn estimate_view(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        let input_rect = letterbox(image.rect(), input_res)?;
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(input_rect)))?;
        log::trace!("landmark network outputs: {:?}", outputs);

        let (network, estimate) = (&self.network, &mut self.estimate);
        self.t_extract.time(|| network.extract(&outputs, estimate))?;

        let scale = input_rect.width() / input_res.width() as f32;
        let offset = Vector2::new(input_rect.x(), input_rect.y());
        self.estimate.landmarks_mut().map_positions(|p| {
            let xy = p.coords.xy() * scale + offset;
            Point3::new(xy.x, xy.y, p.z * scale)
        });

        Ok(&mut self.estimate)
    }
}

/// Follows one object by estimating landmarks in a region of interest (RoI) that moves with it.
///
/// After each successful [`LandmarkTracker::track`], the RoI becomes the padded bounding box of
/// the landmarks, rotated by the object's angle. Trackers do not own their [`Estimator`], so one
/// estimator can serve several trackers.
#[derive(Debug, Clone)]
pub struct LandmarkTracker {
    aspect_ratio: AspectRatio,
    roi: Option<RotatedRect>,
    loss_thresh: f32,
}

impl LandmarkTracker {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Padding added to each side of the landmarks' bounding box, relative to its size.
    const ROI_PADDING: f32 = 0.3;

    /// A tracker for networks taking inputs of `aspect_ratio`. Starts without a RoI.
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
        }
    }

    /// Estimates with a confidence below `threshold` drop the RoI.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Starts tracking in `roi`, which is used as-is.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Estimates landmarks inside the RoI of `full_image` and moves the RoI along.
    ///
    /// Returns `Ok(None)` when there is no RoI, or when the object was lost. Losing the object
    /// clears the RoI. All frames passed in must have the same size.
    pub fn track<'e, E, V>(
        &mut self,
        estimator: &'e mut Estimator<E>,
        full_image: &V,
    ) -> anyhow::Result<Option<TrackingResult<'e, E>>>
    where
        E: Estimate + Confidence,
        V: AsImageView,
    {
        let Some(roi) = self.roi else {
            return Ok(None);
        };

        let view_rect = roi.grow_to_fit_aspect(self.aspect_ratio);
        let estimate = estimator.estimate(&full_image.as_view().view(view_rect))?;
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "lost track: confidence {} < {}",
                estimate.confidence(),
                self.loss_thresh
            );
            self.roi = None;
            return Ok(None);
        }

        // The estimated angle is relative to the crop, so it is read before mapping out of it.
        let angle = roi.rotation_radians() + estimate.angle_radians().unwrap_or(0.0);
        estimate.landmarks_mut().map_positions(|p| {
            let xy = view_rect.transform_out(p.coords.xy());
            Point3::new(xy.x, xy.y, p.z)
        });

        let bounds = RotatedRect::bounding(angle, estimate.landmarks().iter().map(|lm| lm.xy()));
        self.roi = bounds.map(|rect| rect.grow_rel(Self::ROI_PADDING));
        if self.roi.is_none() {
            return Ok(None);
        }

        Ok(Some(TrackingResult {
            view_rect,
            estimate,
        }))
    }
}

/// A successful [`LandmarkTracker::track`] call.
pub struct TrackingResult<'a, E: Estimate> {
    view_rect: RotatedRect,
    estimate: &'a E,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// The area of the full image the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }

    /// The estimate, with landmarks in full image coordinates.
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::Rotation2;

    use crate::image::{Image, Rect};
    use crate::nn::{fixed::constant_cnn, tensor::Tensor};

    use super::*;

    /// An arrow from base to tip, crossed by a bar at its middle.
    #[derive(Clone)]
    struct Arrow {
        landmarks: Landmarks,
        confidence: f32,
    }

    impl Default for Arrow {
        fn default() -> Self {
            Self {
                landmarks: Landmarks::new(4),
                confidence: 0.0,
            }
        }
    }

    impl Estimate for Arrow {
        fn landmarks(&self) -> &Landmarks {
            &self.landmarks
        }

        fn landmarks_mut(&mut self) -> &mut Landmarks {
            &mut self.landmarks
        }

        fn angle_radians(&self) -> Option<f32> {
            let [base, tip] = [0, 1].map(|i| self.landmarks.get(i).xy());
            Some(Rotation2::rotation_between(&Vector2::y(), &(base - tip)).angle())
        }
    }

    impl Confidence for Arrow {
        fn confidence(&self) -> f32 {
            self.confidence
        }
    }

    struct ArrowNetwork {
        cnn: Cnn,
    }

    impl ArrowNetwork {
        const INPUT: Resolution = Resolution::new(100, 100);

        /// Always finds an upright arrow in the middle of its input.
        fn upright(confidence: f32) -> Self {
            let points = [
                50.0, 80.0, 0.0, 50.0, 20.0, 0.0, 30.0, 50.0, 0.0, 70.0, 50.0, 0.0,
            ];
            let outputs = [
                Tensor::from_iter(&[1, 12], points),
                Tensor::from_iter(&[1, 1], [confidence]),
            ];
            Self {
                cnn: constant_cnn(Self::INPUT, &outputs),
            }
        }
    }

    impl Network for ArrowNetwork {
        type Output = Arrow;

        fn cnn(&self) -> &Cnn {
            &self.cnn
        }

        fn extract(&self, outputs: &Outputs, estimate: &mut Arrow) -> anyhow::Result<()> {
            let coords = outputs[0].index([0]).as_slice().chunks_exact(3);
            for (pos, xyz) in estimate.landmarks.positions_mut().iter_mut().zip(coords) {
                *pos = Point3::from_slice(xyz);
            }
            estimate.confidence = outputs[1].index([0, 0]).as_singular();
            Ok(())
        }
    }

    #[test]
    fn landmark_access() {
        let mut lms = Landmarks::new(3);
        assert_eq!(lms.len(), 3);
        assert!(!lms.is_empty());
        assert!(Landmarks::new(0).is_empty());

        lms.map_positions(|p| p + nalgebra::Vector3::new(1.0, 2.0, 3.0));
        assert!(lms.iter().all(|lm| lm == Landmark::new(1.0, 2.0, 3.0)));

        lms.positions_mut()[2] = Point3::new(5.0, 6.0, 7.0);
        assert_eq!(lms.get(2).xy(), Vector2::new(5.0, 6.0));
        assert_eq!(lms.get(2).z(), 7.0);
        assert_eq!(lms.positions()[0], Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn tracker_roi() {
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        assert!(tracker.roi().is_none());
        tracker.set_roi(Rect::from_center(1.0, 1.0, 2.0, 2.0));
        assert_eq!(tracker.roi().unwrap().center(), Vector2::new(1.0, 1.0));
    }

    #[test]
    fn estimate_maps_to_image() {
        let mut estimator = Estimator::new(ArrowNetwork::upright(1.0));
        assert_eq!(estimator.input_resolution(), ArrowNetwork::INPUT);

        // 640x480 is letterboxed to 640x640, starting 80 pixels above the image.
        let image = Image::new(640, 480);
        let arrow = estimator.estimate(&image).unwrap();
        let expected = [(320.0, 432.0), (320.0, 48.0), (192.0, 240.0), (448.0, 240.0)];
        for (lm, (x, y)) in arrow.landmarks().iter().zip(expected) {
            assert_abs_diff_eq!(lm.xy(), Vector2::new(x, y), epsilon = 1e-3);
        }
    }

    #[test]
    fn tracked_rotation_is_stable() {
        let mut estimator = Estimator::new(ArrowNetwork::upright(1.0));
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        let roi = RotatedRect::new(Rect::from_center(320.0, 240.0, 200.0, 200.0), 0.5);
        tracker.set_roi(roi);

        let image = Image::new(640, 480);
        for _ in 0..4 {
            let res = tracker.track(&mut estimator, &image).unwrap().unwrap();
            // In the full image, the arrow is turned just like the region it was found in.
            assert_abs_diff_eq!(res.estimate().angle_radians().unwrap(), 0.5, epsilon = 1e-4);
            assert_abs_diff_eq!(tracker.roi().unwrap().rotation_radians(), 0.5, epsilon = 1e-4);
        }
        assert_abs_diff_eq!(tracker.roi().unwrap().center(), roi.center(), epsilon = 1e-2);
    }

    #[test]
    fn tracker_loses_unconfident_estimates() {
        let mut estimator = Estimator::new(ArrowNetwork::upright(0.4));
        let mut tracker = LandmarkTracker::new(AspectRatio::SQUARE);
        let image = Image::new(64, 64);
        assert!(tracker.track(&mut estimator, &image).unwrap().is_none());

        tracker.set_roi(Rect::from_center(32.0, 32.0, 20.0, 20.0));
        tracker.set_loss_threshold(0.3);
        assert!(tracker.track(&mut estimator, &image).unwrap().is_some());
        assert!(tracker.roi().is_some());

        tracker.set_loss_threshold(0.5);
        assert!(tracker.track(&mut estimator, &image).unwrap().is_none());
        assert!(tracker.roi().is_none());
    }
}

//! Multi-hand tracking.

use std::path::Path;

use crate::config::HandsOptions;
use crate::detection::{self, Detector};
use crate::image::{AsImageView, AspectRatio, ImageView, RotatedRect};
use crate::landmark::{self, Estimator, LandmarkTracker};
use crate::timer::Timer;

use super::{
    detection::{hand_roi, PalmNetwork},
    landmark::{LandmarkNetwork, LandmarkResult},
};

/// Detects hands with the palm detector and tracks them across frames with the landmark network.
///
/// Every call to [`HandTracker::track`] first re-estimates the landmarks of all hands that are
/// already being tracked, inside the region of interest derived from the previous frame. Only if
/// fewer than the maximum number of hands remain is the (much more expensive) palm detector run.
pub struct HandTracker {
    hands: Vec<TrackedHand>,
    next_hand_id: HandId,
    detector: Detector,
    estimator: Estimator<LandmarkResult>,
    input_aspect: AspectRatio,
    max_hands: usize,
    loss_thresh: f32,
    iou_thresh: f32,
}

impl HandTracker {
    /// IoU above which a palm detection is considered to be an already tracked hand.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub const DEFAULT_MAX_HANDS: usize = 2;

    /// Creates a tracker from a palm detection network and a hand landmark network.
    ///
    /// [`HandTracker::from_options`] loads the MediaPipe networks.
    pub fn new<P, L>(palm_network: P, landmark_network: L) -> anyhow::Result<Self>
    where
        P: detection::Network,
        L: landmark::Network<Output = LandmarkResult>,
    {
        let estimator = Estimator::new(landmark_network);
        let input_res = estimator.input_resolution();
        let input_aspect = input_res.aspect_ratio().ok_or_else(|| {
            anyhow::anyhow!("hand landmark network has invalid input resolution {input_res}")
        })?;

        Ok(Self {
            hands: Vec::new(),
            next_hand_id: HandId(0),
            detector: Detector::new(palm_network),
            estimator,
            input_aspect,
            max_hands: Self::DEFAULT_MAX_HANDS,
            loss_thresh: LandmarkTracker::DEFAULT_LOSS_THRESHOLD,
            iou_thresh: Self::DEFAULT_IOU_THRESH,
        })
    }

    /// Loads the networks selected by `options` from `model_dir` and applies its thresholds.
    pub fn from_options(options: &HandsOptions, model_dir: &Path) -> anyhow::Result<Self> {
        options.validate()?;
        let complexity = options.complexity()?;
        let mut tracker = Self::new(
            PalmNetwork::load(model_dir, complexity)?,
            LandmarkNetwork::load(model_dir, complexity)?,
        )?;
        tracker.set_max_hands(options.max_num_hands);
        tracker.set_detection_threshold(options.min_detection_confidence);
        tracker.set_tracking_threshold(options.min_tracking_confidence);
        log::info!(
            "hand tracker ready ({complexity} networks, up to {} hands)",
            options.max_num_hands
        );
        Ok(tracker)
    }

    /// Sets the maximum number of hands to track at once.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }

    /// Sets the minimum palm detection confidence for a new hand to be tracked.
    pub fn set_detection_threshold(&mut self, thresh: f32) {
        self.detector.set_threshold(thresh);
    }

    /// Sets the minimum hand presence score below which a tracked hand is dropped.
    pub fn set_tracking_threshold(&mut self, thresh: f32) {
        self.loss_thresh = thresh;
        for hand in &mut self.hands {
            hand.tracker.set_loss_threshold(thresh);
        }
    }

    /// Sets the intersection-over-union threshold at which a palm detection is considered to
    /// overlap an existing hand's region of interest.
    pub fn set_iou_thresh(&mut self, thresh: f32) {
        self.iou_thresh = thresh;
    }

    /// Returns an iterator over the tracking data for each hand found in the last frame.
    pub fn hands(&self) -> impl Iterator<Item = HandData<'_>> {
        self.hands.iter().map(|hand| HandData {
            id: hand.id,
            lm: &hand.result,
            view_rect: hand.view_rect,
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector.timers().chain(self.estimator.timers())
    }

    /// Updates all tracked hands from `image`, detecting new ones if there is room for them.
    ///
    /// When this returns, [`HandTracker::hands`] yields the hands in `image`.
    pub fn track<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<()> {
        self.track_impl(image.as_view())
    }

    fn track_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<()> {
        let mut i = 0;
        while i < self.hands.len() {
            let hand = &mut self.hands[i];
            match hand.tracker.track(&mut self.estimator, &image)? {
                Some(res) => {
                    hand.result = res.estimate().clone();
                    hand.view_rect = res.view_rect();
                    i += 1;
                }
                None => {
                    log::debug!("lost track of {:?}", hand.id);
                    self.hands.remove(i);
                }
            }
        }

        if self.hands.len() >= self.max_hands {
            return Ok(());
        }

        let rois = self
            .detector
            .detect(&image)?
            .iter()
            .map(hand_roi)
            .collect::<Vec<_>>();

        for roi in rois {
            if self.hands.len() >= self.max_hands {
                break;
            }
            if self.overlaps_tracked_hand(&roi) {
                continue;
            }

            let mut tracker = LandmarkTracker::new(self.input_aspect);
            tracker.set_loss_threshold(self.loss_thresh);
            tracker.set_roi(roi);

            // Estimate right away, so that the new hand shows up in this frame.
            let (result, view_rect) = match tracker.track(&mut self.estimator, &image)? {
                Some(res) => (res.estimate().clone(), res.view_rect()),
                None => {
                    log::trace!("palm detection at {:?} has no hand", roi);
                    continue;
                }
            };

            let id = self.next_hand_id;
            self.next_hand_id.0 += 1;
            log::debug!("tracking new hand {:?}", id);
            self.hands.push(TrackedHand {
                id,
                tracker,
                result,
                view_rect,
            });
        }

        Ok(())
    }

    fn overlaps_tracked_hand(&self, roi: &RotatedRect) -> bool {
        self.hands.iter().any(|hand| {
            hand.tracker
                .roi()
                .map_or(false, |tracked| tracked.iou(roi) >= self.iou_thresh)
        })
    }
}

struct TrackedHand {
    id: HandId,
    tracker: LandmarkTracker,
    result: LandmarkResult,
    view_rect: RotatedRect,
}

/// ID of a tracked hand.
///
/// The assigned [`HandId`]s are unique per [`HandTracker`] assigning them. They are kept between
/// frames for as long as the hand is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandId(u64);

/// Tracking data returned for a hand in the input image.
pub struct HandData<'a> {
    id: HandId,
    lm: &'a LandmarkResult,
    view_rect: RotatedRect,
}

impl<'a> HandData<'a> {
    pub fn id(&self) -> HandId {
        self.id
    }

    /// Hand landmarks, in the coordinates of the image passed to [`HandTracker::track`].
    pub fn landmark_result(&self) -> &'a LandmarkResult {
        self.lm
    }

    /// The region of the image the landmarks were estimated in.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }
}

//! The capture → track → draw → display loop.
//!
//! The loop talks to its collaborators through the [`FrameSource`], [`HandDetector`] and
//! [`Viewer`] traits, so that it can run without camera, networks or display.

use std::time::Duration;

use crate::{
    gui::Input,
    hand::{
        style::{default_hand_connections_style, default_hand_landmarks_style, draw_landmarks},
        tracking::HandTracker,
    },
    image::{draw, Color, Image},
    landmark::Landmarks,
    timer::{FpsCounter, Timer},
    video::webcam::Webcam,
};

/// How long to wait for user input after each frame.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(5);

const STATUS_COLOR: Color = Color::from_rgb8(255, 255, 255);

/// A source of video frames.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    ///
    /// `Ok(None)` means that the frame was empty or unusable; the next read may succeed again.
    fn read(&mut self) -> anyhow::Result<Option<Image>>;

    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> anyhow::Result<Option<Image>> {
        Webcam::read(self)
    }

    fn timers(&self) -> Vec<&Timer> {
        Webcam::timers(self).collect()
    }
}

/// Finds hands in a frame.
pub trait HandDetector {
    /// Returns the landmarks of every hand in `image`, in image coordinates.
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<Landmarks>>;

    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl HandDetector for HandTracker {
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<Landmarks>> {
        self.track(image)?;
        Ok(self
            .hands()
            .map(|hand| hand.landmark_result().landmarks().clone())
            .collect())
    }

    fn timers(&self) -> Vec<&Timer> {
        HandTracker::timers(self).collect()
    }
}

/// Displays frames and reports user input.
pub trait Viewer {
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Waits up to `timeout` for user input.
    fn wait_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Input>>;

    /// Closes all windows.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Statistics about a finished [`run_hand_detection`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of frames that were processed and shown.
    pub frames: u64,
    /// Number of reads that did not produce a frame.
    pub empty_frames: u64,
    /// Sum of the number of hands found in each frame.
    pub hands: u64,
}

/// Runs the hand detection loop until the user quits.
///
/// Every frame read from `source` is passed to `detector`, the resulting hand landmarks are drawn
/// onto it and it is shown in `viewer`. If `mirror` is set, the frame is flipped horizontally
/// before it is shown. Pressing `q` or closing the window ends the loop.
///
/// When the loop ends, `source` is dropped before the windows of `viewer` are closed. This also
/// happens when the loop fails with an error.
pub fn run_hand_detection<S, D, V>(
    mut source: S,
    detector: &mut D,
    viewer: &mut V,
    mirror: bool,
) -> anyhow::Result<RunSummary>
where
    S: FrameSource,
    D: HandDetector + ?Sized,
    V: Viewer + ?Sized,
{
    let result = detection_loop(&mut source, detector, viewer, mirror);

    log::debug!("releasing frame source");
    drop(source);
    let closed = viewer.close();

    let summary = result?;
    closed?;
    log::info!(
        "processed {} frames ({} empty), {} hands detected",
        summary.frames,
        summary.empty_frames,
        summary.hands
    );
    Ok(summary)
}

fn detection_loop<S, D, V>(
    source: &mut S,
    detector: &mut D,
    viewer: &mut V,
    mirror: bool,
) -> anyhow::Result<RunSummary>
where
    S: FrameSource,
    D: HandDetector + ?Sized,
    V: Viewer + ?Sized,
{
    let landmark_style = default_hand_landmarks_style();
    let connection_style = default_hand_connections_style();
    let mut summary = RunSummary::default();
    let mut fps = FpsCounter::new("hand detection");

    loop {
        match source.read()? {
            Some(mut image) => {
                let hands = detector.detect_hands(&image)?;
                for landmarks in &hands {
                    draw_landmarks(&mut image, landmarks, &landmark_style, &connection_style);
                }
                if mirror {
                    image.flip_horizontal_in_place();
                }
                draw::text(&mut image, 8, 8, &status_line(hands.len()))
                    .color(STATUS_COLOR)
                    .align_top()
                    .align_left();
                viewer.show(&image)?;

                summary.frames += 1;
                summary.hands += hands.len() as u64;
                fps.tick_with(source.timers().into_iter().chain(detector.timers()));
            }
            None => {
                // Skip processing, but keep polling so the window stays responsive and quittable.
                log::warn!("empty frame");
                summary.empty_frames += 1;
            }
        }

        if let Some(input) = viewer.wait_key(POLL_TIMEOUT)? {
            log::trace!("input: {:?}", input);
            if input.is_quit() {
                log::info!("quit requested");
                return Ok(summary);
            }
        }
    }
}

/// Text shown on top of every frame.
pub fn status_line(num_hands: usize) -> String {
    if num_hands == 0 {
        "detecting hands...".to_string()
    } else {
        format!("hands detected: {num_hands}")
    }
}

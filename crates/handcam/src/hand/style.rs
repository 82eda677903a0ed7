//! Hand landmark drawing styles.
//!
//! The default styles use per-finger colors for landmarks and connections, thick gray lines around
//! the palm, and white-bordered filled dots for each landmark.

use crate::image::{draw, AsImageViewMut, Color, ImageViewMut};
use crate::landmark::Landmarks;

use super::landmark::{LandmarkIdx, CONNECTIVITY, NUM_LANDMARKS, PALM_LANDMARKS};

const RED: Color = Color::from_rgb8(255, 48, 48);
const PEACH: Color = Color::from_rgb8(255, 229, 180);
const PURPLE: Color = Color::from_rgb8(128, 64, 128);
const YELLOW: Color = Color::from_rgb8(255, 204, 0);
const GREEN: Color = Color::from_rgb8(48, 255, 48);
const BLUE: Color = Color::from_rgb8(21, 101, 192);
const GRAY: Color = Color::from_rgb8(128, 128, 128);

/// Color of the border drawn around each landmark dot.
const BORDER: Color = Color::from_rgb8(224, 224, 224);

const RADIUS: u32 = 5;
const THICKNESS_PALM: u32 = 3;
const THICKNESS_FINGER: u32 = 2;

/// How to draw a landmark or a connection between two landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingSpec {
    pub color: Color,
    /// Line thickness. Landmark dots with a thickness of 0 are filled.
    pub thickness: u32,
    pub circle_radius: u32,
}

impl DrawingSpec {
    pub const fn new(color: Color, thickness: u32, circle_radius: u32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }
}

impl Default for DrawingSpec {
    fn default() -> Self {
        Self::new(Color::RED, 2, 2)
    }
}

/// The finger a landmark or connection belongs to, or `None` for the palm.
fn finger_color(idx: LandmarkIdx) -> Option<Color> {
    use LandmarkIdx::*;
    Some(match idx {
        ThumbMcp | ThumbIp | ThumbTip => PEACH,
        IndexFingerPip | IndexFingerDip | IndexFingerTip => PURPLE,
        MiddleFingerPip | MiddleFingerDip | MiddleFingerTip => YELLOW,
        RingFingerPip | RingFingerDip | RingFingerTip => GREEN,
        PinkyPip | PinkyDip | PinkyTip => BLUE,
        Wrist | ThumbCmc | IndexFingerMcp | MiddleFingerMcp | RingFingerMcp | PinkyMcp => {
            return None
        }
    })
}

/// Returns the default style of every hand landmark, indexed by [`LandmarkIdx`].
pub fn default_hand_landmarks_style() -> [DrawingSpec; NUM_LANDMARKS] {
    LandmarkIdx::ALL.map(|idx| {
        let color = finger_color(idx).unwrap_or(RED);
        DrawingSpec::new(color, 0, RADIUS)
    })
}

/// Returns the default style of every hand connection, in [`CONNECTIVITY`] order.
pub fn default_hand_connections_style() -> Vec<((LandmarkIdx, LandmarkIdx), DrawingSpec)> {
    CONNECTIVITY
        .iter()
        .map(|&(a, b)| {
            let on_palm = PALM_LANDMARKS.contains(&a) && PALM_LANDMARKS.contains(&b);
            let spec = if on_palm {
                DrawingSpec::new(GRAY, THICKNESS_PALM, RADIUS)
            } else {
                // A finger connection's color is the one of its outer landmark.
                let color = finger_color(b).unwrap_or(GRAY);
                DrawingSpec::new(color, THICKNESS_FINGER, RADIUS)
            };
            ((a, b), spec)
        })
        .collect()
}

/// Draws hand landmarks and the connections between them onto `target`.
///
/// Connections are drawn first, so that the landmark dots end up on top.
///
/// # Panics
///
/// This function panics if `landmarks` does not contain exactly [`NUM_LANDMARKS`] landmarks.
pub fn draw_landmarks<I: AsImageViewMut>(
    target: &mut I,
    landmarks: &Landmarks,
    landmark_style: &[DrawingSpec; NUM_LANDMARKS],
    connection_style: &[((LandmarkIdx, LandmarkIdx), DrawingSpec)],
) {
    draw_landmarks_impl(
        &mut target.as_view_mut(),
        landmarks,
        landmark_style,
        connection_style,
    );
}

fn draw_landmarks_impl(
    target: &mut ImageViewMut<'_>,
    landmarks: &Landmarks,
    landmark_style: &[DrawingSpec; NUM_LANDMARKS],
    connection_style: &[((LandmarkIdx, LandmarkIdx), DrawingSpec)],
) {
    assert_eq!(
        landmarks.len(),
        NUM_LANDMARKS,
        "hand landmarks must contain {NUM_LANDMARKS} entries"
    );

    let pixel = |idx: LandmarkIdx| {
        let lm = landmarks.get(idx as usize);
        (lm.x().round() as i32, lm.y().round() as i32)
    };

    for &((a, b), spec) in connection_style {
        let (ax, ay) = pixel(a);
        let (bx, by) = pixel(b);
        draw::line(target, ax, ay, bx, by)
            .color(spec.color)
            .stroke_width(spec.thickness);
    }

    for (idx, spec) in LandmarkIdx::ALL.into_iter().zip(landmark_style) {
        let (x, y) = pixel(idx);
        let border_radius = (spec.circle_radius + 1).max(spec.circle_radius * 6 / 5);
        draw_dot(target, x, y, border_radius, spec.thickness, BORDER);
        draw_dot(target, x, y, spec.circle_radius, spec.thickness, spec.color);
    }
}

fn draw_dot(target: &mut ImageViewMut<'_>, x: i32, y: i32, radius: u32, thickness: u32, color: Color) {
    let mut circle = draw::circle(target, x, y, radius);
    circle.color(color);
    if thickness == 0 {
        circle.filled();
    } else {
        circle.stroke_width(thickness);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use nalgebra::Point3;

    use crate::image::Image;

    use super::*;

    #[test]
    fn landmark_colors() {
        let style = default_hand_landmarks_style();
        for idx in PALM_LANDMARKS {
            assert_eq!(style[*idx as usize].color, RED);
        }
        assert_eq!(style[LandmarkIdx::ThumbTip as usize].color, PEACH);
        assert_eq!(style[LandmarkIdx::IndexFingerPip as usize].color, PURPLE);
        assert_eq!(style[LandmarkIdx::MiddleFingerDip as usize].color, YELLOW);
        assert_eq!(style[LandmarkIdx::RingFingerTip as usize].color, GREEN);
        assert_eq!(style[LandmarkIdx::PinkyTip as usize].color, BLUE);
        assert!(style.iter().all(|s| s.thickness == 0 && s.circle_radius == RADIUS));
    }

    #[test]
    fn every_connection_styled_once() {
        let style = default_hand_connections_style();
        assert_eq!(style.len(), CONNECTIVITY.len());
        let pairs = style.iter().map(|(pair, _)| *pair).collect::<HashSet<_>>();
        assert_eq!(pairs.len(), CONNECTIVITY.len());
        assert!(CONNECTIVITY.iter().all(|pair| pairs.contains(pair)));

        let palm = style
            .iter()
            .filter(|(_, spec)| spec.thickness == THICKNESS_PALM)
            .count();
        assert_eq!(palm, 6);
        assert!(style
            .iter()
            .filter(|(_, spec)| spec.thickness == THICKNESS_FINGER)
            .all(|(_, spec)| spec.color != GRAY));
    }

    #[test]
    fn draws_bordered_dots() {
        let mut image = Image::new(200, 200);
        let mut landmarks = Landmarks::new(NUM_LANDMARKS);
        landmarks.map_positions(|_| Point3::new(150.0, 150.0, 0.0));
        landmarks.positions_mut()[LandmarkIdx::Wrist as usize] = Point3::new(50.0, 50.0, 0.0);

        draw_landmarks(
            &mut image,
            &landmarks,
            &default_hand_landmarks_style(),
            &default_hand_connections_style(),
        );

        assert_eq!(image.get(50, 50), RED);
        // Border ring just outside the colored dot.
        assert_eq!(image.get(50, 44), BORDER);
        // The pinky tip is drawn last, on top of all other landmarks at the same spot.
        assert_eq!(image.get(150, 150), BLUE);
        // Connections from the wrist.
        assert_ne!(image.get(100, 100), Color::NULL);
        assert_eq!(image.get(10, 190), Color::NULL);
    }

    #[test]
    #[should_panic(expected = "hand landmarks must contain")]
    fn wrong_landmark_count() {
        let mut image = Image::new(10, 10);
        draw_landmarks(
            &mut image,
            &Landmarks::new(3),
            &default_hand_landmarks_style(),
            &default_hand_connections_style(),
        );
    }
}

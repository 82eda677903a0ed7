//! Axis-aligned and rotated rectangles in continuous pixel coordinates.

use std::{fmt, ops::RangeInclusive};

use nalgebra::{Rotation2, Vector2};

use super::AspectRatio;

type Vec2f = Vector2<f32>;

/// An axis-aligned rectangle with non-negative (possibly zero) width and height.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vec2f,
    size: Vec2f,
}

impl Rect {
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vec2f::new(x_center, y_center),
            size: Vec2f::new(width, height),
        }
    }

    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_center(x + width / 2.0, y + height / 2.0, width, height)
    }

    /// The rectangle covering `x` horizontally and `y` vertically.
    pub fn from_ranges(x: RangeInclusive<f32>, y: RangeInclusive<f32>) -> Self {
        Self::from_corners(
            Vec2f::new(*x.start(), *y.start()),
            Vec2f::new(*x.end(), *y.end()),
        )
    }

    /// The smallest rectangle containing all `points`, or `None` if there are none.
    pub fn bounding<I: IntoIterator<Item = T>, T: Into<Vec2f>>(points: I) -> Option<Self> {
        let mut points = points.into_iter().map(Into::<Vec2f>::into);
        let first: Vec2f = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self::from_corners(min, max))
    }

    fn from_corners(min: Vec2f, max: Vec2f) -> Self {
        assert!(
            min.x <= max.x && min.y <= max.y,
            "inverted rectangle corners {min:?} and {max:?}"
        );
        let size = max - min;
        Self {
            center: min + size / 2.0,
            size,
        }
    }

    #[inline]
    pub fn top_left(&self) -> Vec2f {
        self.center - self.size / 2.0
    }

    fn bottom_right(&self) -> Vec2f {
        self.center + self.size / 2.0
    }

    /// Left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vec2f {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vec2f {
        self.size
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Multiplies both dimensions by `factor` around the center.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            size: self.size * factor,
            ..*self
        }
    }

    /// Adds `amount` times the width (height) to the left and right (top and bottom) edges.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Widens or heightens the rectangle around its center until it has the aspect ratio `ratio`.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, ratio: AspectRatio) -> Self {
        let ratio = ratio.as_f32();
        let size = if self.height() * ratio >= self.width() {
            Vec2f::new(self.height() * ratio, self.height())
        } else {
            Vec2f::new(self.width(), self.width() / ratio)
        };
        Self { size, ..*self }
    }

    /// The square around the same center whose sides equal the longer side of `self`.
    #[must_use]
    pub fn square_long(&self) -> Self {
        let side = self.size.max();
        Self {
            size: Vec2f::new(side, side),
            ..*self
        }
    }

    #[must_use]
    pub fn move_by(&self, offset: impl Into<Vec2f>) -> Rect {
        Rect {
            center: self.center + offset.into(),
            ..*self
        }
    }

    /// Moves the rectangle so that its top left corner ends up at `(x, y)`.
    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Rect {
        Rect::from_top_left(x, y, self.width(), self.height())
    }

    /// The overlapping area of both rectangles, or `None` if they are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = self.bottom_right().inf(&other.bottom_right());
        (min.x <= max.x && min.y <= max.y).then(|| Self::from_corners(min, max))
    }

    /// Intersection over union. Zero if both rectangles are empty.
    pub fn iou(&self, other: &Self) -> f32 {
        let overlap = self.intersection(other).map_or(0.0, |r| r.area());
        let union = self.area() + other.area() - overlap;
        if union > 0.0 {
            overlap / union
        } else {
            0.0
        }
    }

    /// Whether `point` lies inside or on the border of the rectangle.
    pub fn contains_point(&self, point: impl Into<Vec2f>) -> bool {
        let p = point.into();
        let (min, max) = (self.top_left(), self.bottom_right());
        (min.x..=max.x).contains(&p.x) && (min.y..=max.y).contains(&p.y)
    }

    /// Corners, clockwise from the top left.
    fn corners(&self) -> [Vec2f; 4] {
        let (min, max) = (self.top_left(), self.bottom_right());
        [
            min,
            Vec2f::new(max.x, min.y),
            max,
            Vec2f::new(min.x, max.y),
        ]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tl = self.top_left();
        write!(
            f,
            "Rect({},{} {}x{})",
            tl.x, tl.y, self.size.x, self.size.y
        )
    }
}

/// A [`Rect`] rotated around its center.
///
/// With Y pointing down, positive angles turn the rectangle clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// The smallest rectangle rotated by `radians` that contains all `points`, or `None` if there
    /// are none.
    pub fn bounding<T: Into<Vec2f>, I: IntoIterator<Item = T>>(
        radians: f32,
        points: I,
    ) -> Option<Self> {
        let rotation = Rotation2::new(radians);
        let upright = Rect::bounding(
            points
                .into_iter()
                .map(|p| rotation.inverse_transform_vector(&p.into())),
        )?;
        let center = rotation * upright.center();
        let rect = Rect::from_center(center.x, center.y, upright.width(), upright.height());
        Some(Self::new(rect, radians))
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// The rectangle before rotation.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    #[inline]
    pub fn center(&self) -> Vec2f {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self::new(self.rect.grow_rel(amount), self.radians)
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, ratio: AspectRatio) -> Self {
        Self::new(self.rect.grow_to_fit_aspect(ratio), self.radians)
    }

    /// Maps `pt` into the rectangle's own coordinates, whose origin is its (rotated) top left
    /// corner.
    pub fn transform_in(&self, pt: impl Into<Vec2f>) -> Vec2f {
        let rotation = Rotation2::new(self.radians);
        rotation.inverse_transform_vector(&(pt.into() - self.rect.center())) + self.rect.size() / 2.0
    }

    /// Inverse of [`RotatedRect::transform_in`].
    pub fn transform_out(&self, pt: impl Into<Vec2f>) -> Vec2f {
        let rotation = Rotation2::new(self.radians);
        self.rect.center() + rotation * (pt.into() - self.rect.size() / 2.0)
    }

    pub fn contains_point(&self, point: impl Into<Vec2f>) -> bool {
        let local = self.transform_in(point);
        self.rect.move_to(0.0, 0.0).contains_point(local)
    }

    /// IoU of the axis-aligned bounding boxes of both rectangles.
    ///
    /// Exact for unrotated rectangles and close enough to tell whether two tracking regions cover
    /// the same object.
    pub fn iou(&self, other: &Self) -> f32 {
        match (self.bounding_box(), other.bounding_box()) {
            (Some(a), Some(b)) => a.iou(&b),
            _ => 0.0,
        }
    }

    fn bounding_box(&self) -> Option<Rect> {
        Rect::bounding(self.rotated_corners())
    }

    /// Corners after rotation, starting at the corner that is top left before rotating and going
    /// clockwise.
    pub fn rotated_corners(&self) -> [Vec2f; 4] {
        let rotation = Rotation2::new(self.radians);
        let center = self.rect.center();
        self.rect.corners().map(|p| center + rotation * (p - center))
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

use std::fmt;

use super::Rect;

/// Size in whole pixels of an image, a camera mode or a network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// `640x480`, supported by nearly every webcam.
    pub const VGA: Self = Self::new(640, 480);
    /// `1280x720`.
    pub const RES_720P: Self = Self::new(1280, 720);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns the reduced `width:height` ratio, or `None` if either dimension is zero.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }

    /// Returns the largest rectangle of aspect ratio `ratio` that fits into `self`, centered.
    ///
    /// An empty resolution yields an empty rectangle.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> Rect {
        let (w, h) = (self.width as f32, self.height as f32);
        let fitted = match self.aspect_ratio() {
            None => (w, h),
            // `ratio` is wider than `self`: full width, bars above and below.
            Some(own) if ratio.as_f32() > own.as_f32() => (w, w / ratio.as_f32()),
            Some(_) => (h * ratio.as_f32(), h),
        };

        Rect::from_center(w / 2.0, h / 2.0, fitted.0, fitted.1)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A reduced `width:height` ratio.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Both nonzero and coprime.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1, the input shape of both hand networks.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Reduces `width:height`, returning `None` if either is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let d = gcd(width, height);
        Some(Self {
            width: width / d,
            height: height / d,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

const fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

//! Images and views into them.
//!
//! [`Image`] owns RGBA8 pixel data. [`ImageView`] and [`ImageViewMut`] address a (possibly
//! rotated) rectangular region of an [`Image`] without copying; networks read their input through
//! views, and the [`draw`] functions write through them. Code that accepts either an image or a
//! view takes [`AsImageView`] or [`AsImageViewMut`].

mod color;
pub mod draw;
mod jpeg;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use image::{ImageBuffer, Rgba, RgbaImage};
use nalgebra::Vector2;

pub use color::Color;
pub use jpeg::JpegBackend;
pub use rect::{Rect, RotatedRect};
pub use resolution::*;

/// An owned 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // Same layout as `Rgba8UnormSrgb` textures, so frames can be uploaded to the GPU as-is.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates a `width` x `height` image filled with [`Color::NULL`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image from row-major RGBA8 pixel data.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is not exactly `4 * width * height` bytes long.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected,
        );

        let buf = ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
            .expect("buffer length was checked above");
        Self { buf }
    }

    /// Decodes a JPEG (JFIF or Motion JPEG) frame.
    ///
    /// `HANDCAM_JPEG_BACKEND` selects the decoder, see [`JpegBackend`].
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the rectangle spanned by the image, with its top left corner at the origin.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Borrows the region `rect` of this image.
    ///
    /// `rect` may extend past the image borders. Pixels out there read as [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            placement: Placement::of(self).child(rect),
            image: self,
        }
    }

    /// Mutably borrows the region `rect` of this image.
    ///
    /// `rect` may extend past the image borders. Pixels out there read as [`Color::NULL`] and
    /// writes to them are discarded.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            placement: Placement::of(self).child(rect),
            image: self,
        }
    }

    /// Mirrors the image left to right.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            *pixel = Rgba(color.0);
        }
    }

    /// Returns the RGBA8 pixel data, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// Where a view lies in its root image.
#[derive(Debug, Clone, Copy)]
struct Placement {
    /// The view's area, in root image coordinates.
    rect: RotatedRect,
}

impl Placement {
    fn of(image: &Image) -> Self {
        Self {
            rect: image.rect().into(),
        }
    }

    /// Places `rect`, given in this view's coordinates, in the root image.
    fn child(&self, rect: impl Into<RotatedRect>) -> Self {
        let rect: RotatedRect = rect.into();
        let size = rect.rect().size();
        let center = self.rect.transform_out(rect.rect().center());
        let top_left = center - size * 0.5;
        let radians = self.rect.rotation_radians() + rect.rotation_radians();

        Self {
            rect: RotatedRect::new(rect.rect().move_to(top_left.x, top_left.y), radians),
        }
    }

    fn size(&self) -> (f32, f32) {
        let rect = self.rect.rect();
        (rect.width(), rect.height())
    }

    /// The view's area in its own coordinates.
    fn local_rect(&self) -> Rect {
        let (w, h) = self.size();
        Rect::from_top_left(0.0, 0.0, w, h)
    }

    /// Returns the root image pixel covering the view position `(x, y)`, if there is one.
    fn pixel_at(&self, x: f32, y: f32, image: &Image) -> Option<(u32, u32)> {
        let pos = self.rect.transform_out(Vector2::new(x, y));
        let (px, py) = ((pos.x - 0.5).round(), (pos.y - 0.5).round());

        let (w, h) = (image.width() as f32, image.height() as f32);
        let inside = (0.0..w).contains(&px) && (0.0..h).contains(&py);
        inside.then_some((px as u32, py as u32))
    }

    fn sample(&self, x: f32, y: f32, image: &Image) -> Color {
        self.pixel_at(x, y, image)
            .map_or(Color::NULL, |(px, py)| image.get(px, py))
    }

    fn get(&self, x: u32, y: u32, image: &Image) -> Color {
        self.sample(x as f32 + 0.5, y as f32 + 0.5, image)
    }
}

/// A borrowed, possibly rotated region of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    placement: Placement,
}

impl<'a> ImageView<'a> {
    /// Width of the view, rounded down to whole pixels.
    pub fn width(&self) -> u32 {
        self.placement.size().0 as u32
    }

    /// Height of the view, rounded down to whole pixels.
    pub fn height(&self) -> u32 {
        self.placement.size().1 as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the (possibly fractional) area of the view in its own coordinates.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.placement.local_rect()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.placement.get(x, y, self.image)
    }

    /// Returns the color of the pixel covering the continuous position `(x, y)`.
    ///
    /// Positions outside of the image yield [`Color::NULL`].
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> Color {
        self.placement.sample(x, y, self.image)
    }

    /// Borrows the region `rect` of this view.
    ///
    /// `rect` is in the view's coordinates (and rotation) but is not clipped to the view.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        ImageView {
            image: self.image,
            placement: self.placement.child(rect),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({:?})", self.placement.rect)
    }
}

/// A mutably borrowed, possibly rotated region of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    placement: Placement,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.placement.size().0 as u32
    }

    pub fn height(&self) -> u32 {
        self.placement.size().1 as u32
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.placement.get(x, y, self.image)
    }

    /// Sets the pixel at `(x, y)`. Pixels outside of the image are skipped.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let pixel = self
            .placement
            .pixel_at(x as f32 + 0.5, y as f32 + 0.5, self.image);
        if let Some((px, py)) = pixel {
            self.image.set(px, py, color);
        }
    }

    /// Reborrows `self` for a shorter lifetime, like `&mut *r` does for references.
    #[inline]
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            placement: self.placement,
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({:?})", self.placement.rect)
    }
}

/// Types that can be read as image data: [`Image`], [`ImageView`] and [`ImageViewMut`].
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Types that image data can be written to: [`Image`] and [`ImageViewMut`].
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        let rect = self.rect();
        self.view_mut(rect)
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            placement: self.placement,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView + ?Sized> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageView + ?Sized> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut + ?Sized> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (**self).as_view_mut()
    }
}

//! Guard-style drawing on top of `embedded-graphics`.
//!
//! [`line`], [`circle`] and [`text`] return a guard. Its builder methods adjust style and
//! placement, and the shape is drawn when the guard goes out of scope:
//!
//! ```ignore
//! draw::circle(&mut image, x, y, 5).color(Color::RED).filled();
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::image::{AsImageViewMut, Color, ImageViewMut};

/// Draws a straight line from `(start_x, start_y)` to `(end_x, end_y)`.
///
/// Defaults to a blue line 1 pixel wide.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        target: Target(image.as_view_mut()),
        line: Line::new(Point::new(start_x, start_y), Point::new(end_x, end_y)),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a circle with the given `radius` centered on pixel `(x, y)`.
///
/// Defaults to a green outline 1 pixel wide.
pub fn circle<I: AsImageViewMut>(image: &mut I, x: i32, y: i32, radius: u32) -> DrawCircle<'_> {
    DrawCircle {
        target: Target(image.as_view_mut()),
        circle: Circle::with_center(Point::new(x, y), radius * 2 + 1),
        color: Color::GREEN,
        stroke_width: 1,
        filled: false,
    }
}

/// Draws `text` at `(x, y)` in a 10x20 monospace font.
///
/// Defaults to red text centered on `(x, y)`.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        target: Target(image.as_view_mut()),
        text,
        position: Point::new(x, y),
        color: Color::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

pub struct DrawLine<'a> {
    target: Target<'a>,
    line: Line,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        self.target.render(&self.line.into_styled(style));
    }
}

pub struct DrawCircle<'a> {
    target: Target<'a>,
    circle: Circle,
    color: Color,
    stroke_width: u32,
    filled: bool,
}

impl DrawCircle<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the outline width. Has no effect on filled circles.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the circle instead of drawing its outline.
    pub fn filled(&mut self) -> &mut Self {
        self.filled = true;
        self
    }
}

impl Drop for DrawCircle<'_> {
    fn drop(&mut self) {
        let style = if self.filled {
            PrimitiveStyle::with_fill(self.color)
        } else {
            PrimitiveStyle::with_stroke(self.color, self.stroke_width)
        };
        self.target.render(&self.circle.into_styled(style));
    }
}

pub struct DrawText<'a> {
    target: Target<'a>,
    text: &'a str,
    position: Point,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Places the top edge of the text at the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Places the left edge of the text at the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let font = MonoTextStyle::new(&FONT_10X20, self.color);
        let layout = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        self.target
            .render(&Text::with_text_style(self.text, self.position, font, layout));
    }
}

/// Adapts an [`ImageViewMut`] to `embedded-graphics`, clipping to the view.
struct Target<'a>(ImageViewMut<'a>);

impl Target<'_> {
    fn render<D: Drawable<Color = Color>>(&mut self, item: &D) {
        match item.draw(self) {
            Ok(_) => {}
            Err(never) => match never {},
        }
    }
}

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        let (w, h) = (self.0.width(), self.0.height());
        for Pixel(pos, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(pos.x), u32::try_from(pos.y)) {
                if x < w && y < h {
                    self.0.set(x, y, color);
                }
            }
        }
        Ok(())
    }
}

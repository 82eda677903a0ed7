use std::f32::consts::TAU;

use nalgebra::Vector2;

use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let data = data
        .into_iter()
        .flat_map(|row| row.into_iter())
        .flat_map(|col| col.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data)
}

#[test]
fn nested_view_placement() {
    let image = mkimage([
        [C::YELLOW, C::WHITE, C::WHITE],
        [C::WHITE, C::RED, C::WHITE],
        [C::WHITE, C::WHITE, C::WHITE],
    ]);

    let full = Placement::of(&image);
    assert_eq!(full.local_rect(), Rect::from_top_left(0.0, 0.0, 3.0, 3.0));

    let center = full.child(Rect::from_top_left(1.0, 1.0, 1.0, 1.0));
    assert_eq!(center.local_rect(), Rect::from_top_left(0.0, 0.0, 1.0, 1.0));
    assert_eq!(center.rect, Rect::from_top_left(1.0, 1.0, 1.0, 1.0).into());
    assert_eq!(center.get(0, 0, &image), C::RED);

    // Sub-views may reach outside their parent view.
    let around = center.child(Rect::from_top_left(-1.0, -1.0, 3.0, 3.0));
    assert_eq!(around.rect, Rect::from_top_left(0.0, 0.0, 3.0, 3.0).into());
    assert_eq!(around.get(0, 0, &image), C::YELLOW);

    let corner = full
        .child(Rect::from_top_left(1.0, 1.0, 2.0, 2.0))
        .child(Rect::from_top_left(1.0, 1.0, 2.0, 2.0));
    assert_eq!(corner.rect, Rect::from_top_left(2.0, 2.0, 2.0, 2.0).into());
    assert_eq!(corner.get(0, 0, &image), C::WHITE);
    assert_eq!(corner.get(1, 1, &image), C::NULL);
}

#[test]
fn rotated_views() {
    #[rustfmt::skip]
    let image = mkimage([
        [C::YELLOW, C::WHITE],
        [C::WHITE, C::RED],
    ]);
    let square = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);

    let flip = image.view(RotatedRect::new(square, TAU / 2.0));
    assert_eq!(flip.get(0, 0), C::RED);
    assert_eq!(flip.get(1, 1), C::YELLOW);

    let right_angle = image.view(RotatedRect::new(square, TAU / 4.0));
    assert_eq!(right_angle.get(0, 0), C::WHITE);
    assert_eq!(right_angle.get(1, 0), C::RED);
    assert_eq!(right_angle.get(0, 1), C::YELLOW);
    assert_eq!(right_angle.get(1, 1), C::WHITE);

    // Rotations of nested views add up.
    let twice = right_angle.view(RotatedRect::new(square, TAU / 4.0));
    assert_eq!(twice.get(0, 0), C::RED);
    assert_eq!(twice.get(1, 1), C::YELLOW);

    let shifted = right_angle.view(Rect::from_top_left(-1.0, 1.0, 2.0, 2.0));
    assert_eq!(shifted.get(0, 0), C::NULL);
    assert_eq!(shifted.get(1, 0), C::YELLOW);
}

#[test]
fn out_of_bounds_view() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 99.0, 100.0));
    assert_eq!(view.width(), 99);
    assert_eq!(view.height(), 100);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);
}

#[test]
fn sample_continuous() {
    let image = mkimage([[C::RED, C::GREEN]]);
    let view = image.as_view();
    assert_eq!(view.sample(0.2, 0.5), C::RED);
    assert_eq!(view.sample(1.7, 0.9), C::GREEN);
    assert_eq!(view.sample(2.5, 0.5), C::NULL);
    assert_eq!(view.sample(-0.5, 0.5), C::NULL);
}

#[test]
fn mutable_view_ignores_outside_writes() {
    let mut image = Image::new(2, 2);
    let mut view = image.view_mut(Rect::from_top_left(1.0, 1.0, 2.0, 2.0));
    view.set(0, 0, C::BLUE);
    view.set(1, 1, C::BLUE);
    assert_eq!(view.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 1), C::BLUE);
    assert_eq!(image.get(0, 0), C::NULL);
}

#[test]
fn rotated_view_write() {
    let mut image = Image::new(3, 3);
    let center = Vector2::new(1.5, 1.5);
    let rect = RotatedRect::new(Rect::from_center(center.x, center.y, 3.0, 1.0), TAU / 4.0);
    let mut column = image.view_mut(rect);
    for x in 0..3 {
        column.set(x, 0, C::WHITE);
    }
    for y in 0..3 {
        assert_eq!(image.get(1, y), C::WHITE);
        assert_eq!(image.get(0, y), C::NULL);
    }
}

#[test]
fn mirror() {
    let mut image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(1, 0), C::GREEN);
    assert_eq!(image.get(2, 0), C::RED);
}

#[test]
fn from_rgba8_layout() {
    let image = Image::from_rgba8(Resolution::new(1, 2), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(image.get(0, 1), Color([5, 6, 7, 8]));
    assert_eq!(image.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
#[should_panic(expected = "incorrect buffer size")]
fn from_rgba8_size_mismatch() {
    Image::from_rgba8(Resolution::new(2, 2), &[0; 4]);
}

//! Lockstep iteration.

use std::iter::Zip;

/// Pairs up the items of `a` and `b` like [`Iterator::zip`], but requires both sides to have the
/// same number of items.
///
/// Used where network outputs are copied into buffers of a fixed size.
///
/// # Panics
///
/// Panics before yielding anything if the lengths differ, instead of silently stopping at the end
/// of the shorter side.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B: IntoIterator,
    B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    if a.len() != b.len() {
        panic!("length mismatch in `zip_exact`: {} vs. {} items", a.len(), b.len());
    }
    a.zip(b)
}

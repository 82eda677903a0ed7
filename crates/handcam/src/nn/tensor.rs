//! Tensor API.
//!
//! Tensors are the inputs and outputs of neural networks: N-dimensional arrays of `f32` values,
//! stored in row-major order.

use std::fmt;

use tinyvec::TinyVec;

type Shape = TinyVec<[usize; 4]>;

/// A dynamically shaped, owned tensor.
///
/// Data is accessed by indexing a prefix of the dimensions with [`Tensor::index`], which yields a
/// [`TensorView`] of the remaining dimensions, and then reading that view with
/// [`TensorView::as_slice`] or [`TensorView::as_singular`].
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Box<[f32]>,
}

/// A borrowed view into a suffix of a [`Tensor`]'s dimensions.
#[derive(Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

impl Tensor {
    /// Creates an `N`-dimensional tensor of the given shape by calling `f` for each element.
    ///
    /// `f` is invoked in row-major order, starting with `[0, ..., 0, 0]`, then
    /// `[0, ..., 0, 1]` and so on.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let len = shape.iter().product();
        let mut data = Vec::with_capacity(len);
        let mut index = [0; N];
        for _ in 0..len {
            data.push(f(index));
            // Advance the innermost dimension first, carrying over into outer ones.
            for dim in (0..N).rev() {
                index[dim] += 1;
                if index[dim] < shape[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }

        Self {
            shape: shape.iter().copied().collect(),
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as `shape` describes, otherwise this method will
    /// panic.
    #[track_caller]
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "element count does not match tensor shape {shape:?}"
        );
        Self {
            shape: shape.iter().copied().collect(),
            data,
        }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tract.as_slice::<f32>()?;
        Ok(Self::from_iter(tract.shape(), data.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        Ok(tract_onnx::prelude::Tensor::from_shape(
            self.shape(),
            &self.data,
        )?)
    }

    /// Returns the shape of this tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns a view of the whole tensor.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[2, 3, 4]` with `[a, b]` returns a view of shape `[4]`.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Indexes a prefix of the view's dimensions with `indices`.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape,
            indices
        );

        let mut data = self.data;
        for (dim, &index) in indices.iter().enumerate() {
            assert!(
                index < self.shape[dim],
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape,
                indices
            );
            let stride = data.len() / self.shape[dim];
            data = &data[index * stride..(index + 1) * stride];
        }

        TensorView {
            shape: &self.shape[N..],
            data,
        }
    }

    /// Returns the values stored in a 1-dimensional view as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape
        );
        self.data
    }

    /// Returns the value stored in a 0-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor of shape {:?} as singular element",
            self.shape,
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor {:?}", self.shape())
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView {:?}", self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_fn_order() {
        let mut calls = Vec::new();
        let t = Tensor::from_array_shape_fn([2, 3], |[y, x]| {
            calls.push((y, x));
            (y * 10 + x) as f32
        });
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(calls, [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(t.index([1]).as_slice(), &[10.0, 11.0, 12.0]);
        assert_eq!(t.index([0, 2]).as_singular(), 2.0);
    }

    #[test]
    fn empty_dimension() {
        let t = Tensor::from_array_shape_fn([3, 0], |_| unreachable!());
        assert_eq!(t.shape(), &[3, 0]);
    }

    #[test]
    fn nested_index() {
        let t = Tensor::from_iter(&[1, 2, 2, 3], (0..12).map(|i| i as f32));
        assert_eq!(t.index([0, 1]).shape(), &[2, 3]);
        assert_eq!(t.index([0, 1, 1]).as_slice(), &[9.0, 10.0, 11.0]);
        assert_eq!(t.index([0]).index([0, 1, 2]).as_singular(), 5.0);
    }

    #[test]
    #[should_panic(expected = "attempted to index")]
    fn index_out_of_bounds() {
        let t = Tensor::from_iter(&[1, 3], [1.0, 2.0, 3.0]);
        t.index([1]);
    }

    #[test]
    #[should_panic(expected = "as slice")]
    fn slice_of_matrix() {
        let t = Tensor::from_iter(&[1, 3], [1.0, 2.0, 3.0]);
        t.view().as_slice();
    }

    #[test]
    fn tract_conversion() {
        let t = Tensor::from_iter(&[1, 2], [0.5, -1.0]);
        let tract = t.to_tract().unwrap();
        assert_eq!(tract.shape(), &[1, 2]);
        assert_eq!(Tensor::from_tract(&tract).unwrap(), t);
    }
}

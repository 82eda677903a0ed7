//! ONNX model loading and CPU inference with `tract`.

pub mod tensor;

use std::{
    fmt,
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedModel, TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Memory layout of a CNN's image input.
///
/// `N` is the batch size (always 1), `C` the 3 RGB channels, `H` and `W` the input height and
/// width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// `[N, C, H, W]`
    NCHW,
    /// `[N, H, W, C]`
    NHWC,
}

impl CnnInputShape {
    /// Extracts the input resolution from a concrete input tensor shape.
    fn input_resolution(self, dims: &[usize]) -> anyhow::Result<Resolution> {
        let (h, w) = match (self, dims) {
            (Self::NCHW, &[1, 3, h, w]) => (h, w),
            (Self::NHWC, &[1, h, w, 3]) => (h, w),
            _ => bail!("input shape {dims:?} does not match {self:?} layout"),
        };
        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }

    fn tensor(self, res: Resolution, mut pixel: impl FnMut(usize, usize) -> [f32; 3]) -> Tensor {
        let (h, w) = (res.height() as usize, res.width() as usize);
        match self {
            Self::NCHW => Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| pixel(x, y)[c]),
            Self::NHWC => Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| pixel(x, y)[c]),
        }
    }
}

/// Linearly maps 8-bit sRGB channel values onto the range a network was trained with.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    start: f32,
    span: f32,
}

impl ColorMapper {
    /// Maps 0 to the start of `range` and 255 to its end.
    pub fn linear(range: RangeInclusive<f32>) -> Self {
        let (start, end) = range.into_inner();
        assert!(start < end, "empty color range {start}..={end}");
        Self {
            start,
            span: end - start,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|v| self.start + self.span * (f32::from(v) / 255.0))
    }
}

/// A CNN taking a single RGB image.
///
/// Clones share the loaded model.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    shape: CnnInputShape,
    colors: ColorMapper,
}

impl Cnn {
    /// Wraps `nn`, which must take one input laid out as `shape`.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        colors: ColorMapper,
    ) -> anyhow::Result<Self> {
        let inputs = nn.num_inputs();
        if inputs != 1 {
            bail!("expected a network with a single image input, found {inputs} inputs");
        }

        Ok(Self {
            input_res: shape.input_resolution(&nn.input_shape(0)?)?,
            nn,
            shape,
            colors,
        })
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `image`, stretched to the input resolution.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let input = self.input_tensor(image.as_view());
        self.nn.estimate(&[input])
    }

    fn input_tensor(&self, view: ImageView<'_>) -> Tensor {
        sample_input(view, self.input_res, self.shape, &self.colors)
    }
}

/// Builds an input tensor of resolution `res` by sampling `view` at each input pixel center.
fn sample_input(
    view: ImageView<'_>,
    res: Resolution,
    shape: CnnInputShape,
    colors: &ColorMapper,
) -> Tensor {
    let rect = view.rect();
    let step_x = rect.width() / res.width() as f32;
    let step_y = rect.height() / res.height() as f32;
    shape.tensor(res, |x, y| {
        let color = view.sample((x as f32 + 0.5) * step_x, (y as f32 + 0.5) * step_y);
        colors.map(color)
    })
}

impl fmt::Debug for Cnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cnn({:?} {})", self.shape, self.input_res)
    }
}

/// An optimized, ready to run ONNX model. Clones share the model.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Plan>);

impl NeuralNetwork {
    /// Loads the `.onnx` file at `path` and optimizes it for inference.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::read(path).with_context(|| format!("failed to load network '{}'", path.display()))
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        if path.extension().map_or(true, |ext| ext != "onnx") {
            bail!("not an `.onnx` file");
        }
        Self::from_onnx(&std::fs::read(path)?)
    }

    /// Loads a model from the contents of an ONNX file.
    pub fn from_onnx(mut data: &[u8]) -> anyhow::Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut data)?
            .into_optimized()?;
        Self::from_model(model)
    }

    /// Wraps an already built tract model, computing all of its outputs.
    pub fn from_model(model: TypedModel) -> anyhow::Result<Self> {
        let outlets = model.output_outlets()?.to_vec();
        Ok(Self(Arc::new(SimplePlan::new_for_outputs(model, &outlets)?)))
    }

    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Shape of input `index`. Fails for inputs with symbolic dimensions.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        let dims = fact
            .shape
            .as_concrete()
            .with_context(|| format!("input {index} has symbolic dimensions"))?;
        Ok(dims.to_vec())
    }

    /// Runs one inference pass.
    pub fn estimate(&self, inputs: &[Tensor]) -> anyhow::Result<Outputs> {
        let values = inputs
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        self.0
            .run(values)?
            .iter()
            .map(|value| Tensor::from_tract(value))
            .collect()
    }
}

/// Output tensors of one inference pass, in network output order.
#[derive(Debug)]
pub struct Outputs(TVec<Tensor>);

impl Outputs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.0[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stand-in networks for tests that exercise the code around inference.
#[cfg(test)]
pub(crate) mod fixed {
    use tract_onnx::prelude::{DatumType, TypedFact, TypedModel};

    use super::*;

    /// A CNN with an NCHW input of `input_res` that ignores its input and always returns
    /// `outputs`.
    pub(crate) fn constant_cnn(input_res: Resolution, outputs: &[Tensor]) -> Cnn {
        let (w, h) = (input_res.width() as usize, input_res.height() as usize);
        let mut model = TypedModel::default();
        model
            .add_source("image", TypedFact::dt_shape(DatumType::F32, [1, 3, h, w]))
            .unwrap();
        let outlets = outputs
            .iter()
            .enumerate()
            .map(|(i, t)| {
                model
                    .add_const(format!("output{i}"), t.to_tract().unwrap())
                    .unwrap()
            })
            .collect::<Vec<_>>();
        model.set_output_outlets(&outlets).unwrap();

        let nn = NeuralNetwork::from_model(model).unwrap();
        Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use crate::image::{Image, Rect};

    use super::*;

    fn sample(view: ImageView<'_>, res: Resolution, shape: CnnInputShape) -> Tensor {
        sample_input(view, res, shape, &ColorMapper::linear(0.0..=1.0))
    }

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn input_shapes() {
        assert_eq!(
            CnnInputShape::NCHW
                .input_resolution(&[1, 3, 192, 192])
                .unwrap(),
            Resolution::new(192, 192)
        );
        assert_eq!(
            CnnInputShape::NHWC.input_resolution(&[1, 224, 256, 3]).unwrap(),
            Resolution::new(256, 224)
        );
        assert!(CnnInputShape::NCHW
            .input_resolution(&[1, 224, 224, 3])
            .is_err());
    }

    #[test]
    fn image_sampling() {
        // Left half red, right half blue.
        let mut image = Image::new(4, 2);
        for y in 0..2 {
            for x in 0..4 {
                image.set(x, y, if x < 2 { Color::RED } else { Color::BLUE });
            }
        }

        let t = sample(image.as_view(), Resolution::new(2, 2), CnnInputShape::NCHW);
        assert_eq!(t.shape(), &[1, 3, 2, 2]);
        // channel 0 (red), row 0
        assert_eq!(t.index([0, 0, 0]).as_slice(), &[1.0, 0.0]);
        // channel 2 (blue), row 1
        assert_eq!(t.index([0, 2, 1]).as_slice(), &[0.0, 1.0]);

        let t = sample(image.as_view(), Resolution::new(2, 2), CnnInputShape::NHWC);
        assert_eq!(t.index([0, 0, 1]).as_slice(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn letterbox_sampling() {
        // Viewing a region larger than the image pads with transparent black.
        let mut image = Image::new(2, 2);
        image.clear(Color::WHITE);
        let view = image.view(Rect::from_top_left(0.0, -1.0, 2.0, 4.0));

        let t = sample(view, Resolution::new(1, 4), CnnInputShape::NHWC);
        assert_eq!(t.index([0, 0, 0]).as_slice(), &[0.0, 0.0, 0.0]);
        assert_eq!(t.index([0, 1, 0]).as_slice(), &[1.0, 1.0, 1.0]);
        assert_eq!(t.index([0, 2, 0]).as_slice(), &[1.0, 1.0, 1.0]);
        assert_eq!(t.index([0, 3, 0]).as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn constant_network() {
        let outputs = [
            Tensor::from_iter(&[1, 2], [1.0, 2.0]),
            Tensor::from_iter(&[1, 1], [0.5]),
        ];
        let cnn = fixed::constant_cnn(Resolution::new(8, 4), &outputs);
        assert_eq!(cnn.input_resolution(), Resolution::new(8, 4));

        let image = Image::new(3, 3);
        let out = cnn.estimate(&image).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], outputs[0]);
        assert_eq!(out[1].index([0, 0]).as_singular(), 0.5);
    }
}

pub mod activations;
pub mod conv;
pub mod init;
pub mod maxpool;
pub mod sequential;

pub use activations::relu;
pub use conv::Conv2d;
pub use init::Initializer;
pub use maxpool::MaxPool2d;
pub use sequential::{parse_specs, Layer, LayerSpec, Sequential};

use anyhow::Result;
use ndarray::prelude::*;
use ndarray_rand::{rand_distr::StandardNormal, RandomExt};

/// Anything that maps an image batch `[batch, channels, H, W]` to a feature
/// batch `[batch, C, rows, cols]`. Implementations are expected to be
/// deterministic and free of side effects, the prober calls them in inference
/// mode only.
pub trait FeatureExtractor {
    fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(ArrayView4<f32>) -> Result<Array4<f32>>,
{
    fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self(x)
    }
}

pub fn randn<D: Dimension, Sh: ShapeBuilder<Dim = D>>(shape: Sh) -> Array<f32, D> {
    Array::random(shape, StandardNormal)
}

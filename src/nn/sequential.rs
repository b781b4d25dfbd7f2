use anyhow::{Context, Error, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::activations::relu;
use super::conv::Conv2d;
use super::init::Initializer;
use super::maxpool::MaxPool2d;
use super::FeatureExtractor;

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

/// Architecture description of a single layer, as written in the `model/dnn`
/// config entry, e.g. `[Conv(out: 16, kernel: 3, pad: 1), Relu, MaxPool(kernel: 2)]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSpec {
    Conv {
        out: usize,
        kernel: usize,
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        pad: usize,
        #[serde(default = "yes")]
        bias: bool,
    },
    Relu,
    MaxPool {
        kernel: usize,
        /// defaults to the kernel size
        #[serde(default)]
        stride: Option<usize>,
    },
}

pub fn parse_specs(text: &str) -> Result<Vec<LayerSpec>> {
    let specs: Vec<LayerSpec> = ron::from_str(text).with_context(|| format!("Failed to parse layers {text}"))?;
    if specs.is_empty() {
        return Err(Error::msg("network needs at least one layer"));
    }
    Ok(specs)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Layer {
    Conv(Conv2d),
    Relu,
    MaxPool(MaxPool2d),
}

impl Layer {
    pub fn forward(&self, x: Array4<f32>) -> Result<Array4<f32>> {
        match self {
            Layer::Conv(conv) => conv.forward(x.view()),
            Layer::Relu => Ok(relu(x)),
            Layer::MaxPool(pool) => pool.forward(x.view()),
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Layer::Conv(conv) => conv.num_params(),
            Layer::Relu | Layer::MaxPool(_) => 0,
        }
    }
}

/// A plain feed forward stack of layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequential {
    specs: Vec<LayerSpec>,
    layers: Vec<Layer>,
    in_channels: usize,
}

impl Sequential {
    pub fn build(specs: &[LayerSpec], in_channels: usize, init: Initializer) -> Result<Self> {
        let mut layers = Vec::with_capacity(specs.len());
        let mut channels = in_channels;
        for (i, spec) in specs.iter().enumerate() {
            let layer = match *spec {
                LayerSpec::Conv { out, kernel, stride, pad, bias } => {
                    let conv = Conv2d::new(channels, out, [kernel; 2], [stride; 2], [pad; 2], bias, init)
                        .with_context(|| format!("layer {i}"))?;
                    channels = out;
                    Layer::Conv(conv)
                }
                LayerSpec::Relu => Layer::Relu,
                LayerSpec::MaxPool { kernel, stride } => {
                    let stride = stride.unwrap_or(kernel);
                    Layer::MaxPool(MaxPool2d::new([kernel; 2], [stride; 2]).with_context(|| format!("layer {i}"))?)
                }
            };
            layers.push(layer);
        }
        Ok(Sequential { specs: specs.to_vec(), layers, in_channels })
    }

    pub fn specs(&self) -> &[LayerSpec] {
        &self.specs
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::num_params).sum()
    }

    /// Size of the parameters in bytes
    pub fn num_bytes(&self) -> usize {
        self.num_params() * std::mem::size_of::<f32>()
    }
}

impl FeatureExtractor for Sequential {
    fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.layers
            .iter()
            .enumerate()
            .try_fold(x.to_owned(), |x, (i, layer)| layer.forward(x).with_context(|| format!("layer {i}")))
    }
}

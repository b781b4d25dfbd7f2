use anyhow::{Error, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::init::Initializer;

/// 2d convolution over NCHW batches with zero padding.
///
/// Every output element is accumulated in the same fixed order (bias, then
/// input channel, kernel row, kernel column), so the value computed for a
/// sample never depends on which other samples share its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2d {
    filter: Array4<f32>, // [out, in, kh, kw]
    bias: Option<Array1<f32>>,
    stride: [usize; 2],
    pad: [usize; 2],
}

impl Conv2d {
    pub fn new(
        in_chan: usize,
        out_chan: usize,
        kernel_size: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        bias: bool,
        init: Initializer,
    ) -> Result<Self> {
        let receptive_field = kernel_size[0] * kernel_size[1];
        let fan_in = receptive_field * in_chan;
        let fan_out = receptive_field * out_chan;
        let filter = init.init((out_chan, in_chan, kernel_size[0], kernel_size[1]), fan_in, fan_out)?;
        let bias = if bias {
            Some(Initializer::Zeros.init(out_chan, fan_in, fan_out)?)
        } else {
            None
        };
        Self::from_weights(filter, bias, stride, padding)
    }

    pub fn from_weights(
        filter: Array4<f32>,
        bias: Option<Array1<f32>>,
        stride: [usize; 2],
        pad: [usize; 2],
    ) -> Result<Self> {
        let (out_chan, in_chan, kh, kw) = filter.dim();
        if out_chan == 0 || in_chan == 0 || kh == 0 || kw == 0 {
            return Err(Error::msg(format!("degenerate conv filter {:?}", filter.dim())));
        }
        if stride[0] == 0 || stride[1] == 0 {
            return Err(Error::msg("conv stride cannot be zero"));
        }
        if let Some(b) = &bias {
            if b.len() != out_chan {
                return Err(Error::msg(format!("bias has {} entries for {out_chan} filters", b.len())));
            }
        }
        Ok(Conv2d { filter, bias, stride, pad })
    }

    pub fn in_channels(&self) -> usize {
        self.filter.len_of(Axis(1))
    }

    pub fn out_channels(&self) -> usize {
        self.filter.len_of(Axis(0))
    }

    pub fn num_params(&self) -> usize {
        self.filter.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// Spatial size of the output for an input of `h` x `w`
    pub fn output_shape(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let (_, _, kh, kw) = self.filter.dim();
        let padded = (h + 2 * self.pad[0], w + 2 * self.pad[1]);
        if padded.0 < kh || padded.1 < kw {
            return Err(Error::msg(format!(
                "input {h}x{w} with padding {:?} is smaller than the {kh}x{kw} kernel",
                self.pad
            )));
        }
        Ok(((padded.0 - kh) / self.stride[0] + 1, (padded.1 - kw) / self.stride[1] + 1))
    }

    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oc, ic, kh, kw) = self.filter.dim();
        if c != ic {
            return Err(Error::msg(format!("conv expects {ic} input channels, got {c}")));
        }
        let (oh, ow) = self.output_shape(h, w)?;
        let mut y = Array4::<f32>::zeros((n, oc, oh, ow));

        for (xb, mut yb) in x.outer_iter().zip(y.outer_iter_mut()) {
            for o in 0..oc {
                let bias = self.bias.as_ref().map_or(0.0, |b| b[o]);
                for i in 0..oh {
                    for j in 0..ow {
                        let mut acc = bias;
                        for ci in 0..ic {
                            for u in 0..kh {
                                // row in unpadded input coordinates
                                let r = (i * self.stride[0] + u) as isize - self.pad[0] as isize;
                                if r < 0 || r >= h as isize {
                                    continue;
                                }
                                for v in 0..kw {
                                    let col = (j * self.stride[1] + v) as isize - self.pad[1] as isize;
                                    if col < 0 || col >= w as isize {
                                        continue;
                                    }
                                    acc += xb[[ci, r as usize, col as usize]] * self.filter[[o, ci, u, v]];
                                }
                            }
                        }
                        yb[[o, i, j]] = acc;
                    }
                }
            }
        }
        Ok(y)
    }
}

use anyhow::{Error, Result};
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxPool2d {
    kernel_size: [usize; 2],
    stride: [usize; 2],
}

impl MaxPool2d {
    pub fn new(kernel_size: [usize; 2], stride: [usize; 2]) -> Result<Self> {
        if kernel_size.contains(&0) || stride.contains(&0) {
            return Err(Error::msg(format!(
                "max pool needs a positive kernel and stride, got {kernel_size:?} / {stride:?}"
            )));
        }
        Ok(MaxPool2d { kernel_size, stride })
    }

    pub fn output_shape(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let [kh, kw] = self.kernel_size;
        if h < kh || w < kw {
            return Err(Error::msg(format!("input {h}x{w} is smaller than the {kh}x{kw} pool")));
        }
        Ok(((h - kh) / self.stride[0] + 1, (w - kw) / self.stride[1] + 1))
    }

    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = self.output_shape(h, w)?;
        let [kh, kw] = self.kernel_size;
        let mut y = Array4::<f32>::zeros((n, c, oh, ow));
        Zip::indexed(&mut y).for_each(|(b, ch, i, j), out| {
            let r = i * self.stride[0];
            let col = j * self.stride[1];
            let window = x.slice(s![b, ch, r..r + kh, col..col + kw]);
            *out = window.fold(f32::NEG_INFINITY, |m, v| m.max(*v));
        });
        Ok(y)
    }
}

#[test]
fn test_maxpool() {
    let pool = MaxPool2d::new([2, 2], [2, 2]).unwrap();
    let x = Array::from_shape_vec((1, 1, 4, 4), (0..16).map(|v| v as f32).collect()).unwrap();
    let y = pool.forward(x.view()).unwrap();
    assert_eq!(y, array![[[5.0f32, 7.0], [13.0, 15.0]]].insert_axis(Axis(0)));
    assert!(pool.forward(Array4::zeros((1, 1, 1, 3)).view()).is_err());
    assert!(MaxPool2d::new([0, 2], [1, 1]).is_err());
}

use ndarray::prelude::*;

use crate::datasets::Coord;
use crate::error::ProbeError;

/// Channels of every probing image
pub const IMPULSE_CHANNELS: usize = 3;

/// The all-zero input the baseline is computed from, `[1, 3, height, width]`
pub fn zeros(height: usize, width: usize) -> Array4<f32> {
    Array4::zeros((1, IMPULSE_CHANNELS, height, width))
}

/// Builds `[coords.len(), 3, height, width]` impulse images: one zero tensor for
/// the whole batch, with sample `i` set to 1 on every channel at `coords[i]`
pub fn impulse_batch(coords: &[Coord], height: usize, width: usize) -> Result<Array4<f32>, ProbeError> {
    let mut batch = Array4::zeros((coords.len(), IMPULSE_CHANNELS, height, width));
    for (i, c) in coords.iter().enumerate() {
        if c.row >= height || c.col >= width {
            return Err(ProbeError::CoordOutOfBounds { row: c.row, col: c.col, height, width });
        }
        batch.slice_mut(s![i, .., c.row, c.col]).fill(1.0);
    }
    Ok(batch)
}

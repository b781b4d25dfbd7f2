/// This module only defines the dataset logic, which enumerates the data points
/// and groups them into batches. Turning data points into tensors is left to the
/// consumer of the batches.
pub mod impulse;
pub mod loader;

pub use impulse::{Coord, ImpulseDataset};
pub use loader::BatchLoader;

/// The universal Dataset trait, a fixed size, randomly indexable sequence
pub trait Dataset {
    type DataPoint;
    fn len(&self) -> usize;
    /// `index` must lie in `0..self.len()`
    fn get(&self, index: usize) -> Self::DataPoint;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod impulse;
pub mod map;
pub mod runner;

pub use impulse::{impulse_batch, IMPULSE_CHANNELS};
pub use map::{Bounds, InfluenceMap};
pub use runner::{Comparison, ProbeConfig, ProbeContext, ProbeRunner};

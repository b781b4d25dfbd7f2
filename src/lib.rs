pub mod analyzer;
pub mod checkpoint;
pub mod configs;
pub mod datasets;
pub mod device;
pub mod error;
pub mod export;
pub mod logging;
pub mod nn;
pub mod probe;
pub mod settings;

pub use analyzer::Analyzer;
pub use device::Device;
pub use error::ProbeError;
pub use nn::FeatureExtractor;
pub use probe::{InfluenceMap, ProbeConfig, ProbeContext, ProbeRunner};

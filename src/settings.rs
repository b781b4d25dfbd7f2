use std::path::PathBuf;

use anyhow::{Context, Error, Result};

use crate::configs::Config;
use crate::config;
use crate::device::{available_parallelism, Device};
use crate::nn::{parse_specs, Initializer, LayerSpec};
use crate::probe::{Comparison, ProbeConfig};

pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_FILENAME: &str = "receptive_field.jpg";

/// Small VGG style stack, two pooling stages
pub const DEFAULT_DNN: &str = "[
    Conv(out: 8, kernel: 3, pad: 1), Relu,
    Conv(out: 8, kernel: 3, pad: 1), Relu,
    MaxPool(kernel: 2),
    Conv(out: 16, kernel: 3, pad: 1), Relu,
    Conv(out: 16, kernel: 3, pad: 1), Relu,
    MaxPool(kernel: 2),
    Conv(out: 32, kernel: 3, pad: 1), Relu,
]";

pub fn default_config() -> Config {
    config!(
        ("image", [("height", 64), ("width", 64)]),
        ("data", [("workers", -1)]),
        ("model", [("dir", Path("model")), ("dnn", DEFAULT_DNN), ("init", "HeNormal")]),
        ("device", [("kind", "auto"), ("threads", -1)]),
        ("probe", [("tolerance", 0.0)])
    )
}

/// Validated, typed view of the config tree
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub height: usize,
    pub width: usize,
    pub workers: usize,
    pub batch_size: usize,
    pub tolerance: f32,
    pub model_dir: PathBuf,
    pub dnn: Vec<LayerSpec>,
    /// Used when there is no checkpoint to restore
    pub init: Initializer,
    pub device: Device,
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let height: usize = config.value("image/height")?;
        let width: usize = config.value("image/width")?;
        if height == 0 || width == 0 {
            return Err(Error::msg(format!("image must be at least 1x1, got {height}x{width}")));
        }
        let workers: isize = config.value("data/workers")?;
        let workers = if workers < 0 { available_parallelism() } else { workers as usize };

        let tolerance: f32 = config.value("probe/tolerance")?;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::msg(format!("probe/tolerance must be finite and non-negative, got {tolerance}")));
        }
        let dnn: String = config.value("model/dnn")?;
        let dnn = parse_specs(&dnn).context("On key model/dnn")?;
        let init: String = config.value("model/init")?;
        let init = Initializer::parse(&init).context("On key model/init")?;
        let kind: String = config.value("device/kind")?;
        let device = Device::parse(&kind, config.value("device/threads")?).context("On key device/kind")?;

        Ok(Settings {
            height,
            width,
            workers,
            batch_size: DEFAULT_BATCH_SIZE,
            tolerance,
            model_dir: config.value("model/dir")?,
            dnn,
            init,
            device,
        })
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            batch_size: self.batch_size,
            workers: self.workers,
            comparison: Comparison::from_tolerance(self.tolerance),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::from_config(&default_config()).unwrap();
        assert_eq!((s.height, s.width), (64, 64));
        assert_eq!(s.workers, available_parallelism());
        assert_eq!(s.model_dir, PathBuf::from("model"));
        assert_eq!(s.dnn.len(), 12);
        assert_eq!(s.init, Initializer::HeNormal);
        assert_eq!(s.device, Device::auto());
        assert_eq!(s.probe_config().comparison, Comparison::Exact);
        assert_eq!(s.probe_config().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn overrides() {
        let mut c = default_config();
        c.update(&Config::from_ron(r#"{"image": {"height": 5}, "device": {"kind": "threads", "threads": 2}}"#).unwrap())
            .unwrap();
        c.modify("probe/tolerance=0.25").unwrap();
        c.modify("data/workers=0").unwrap();
        c.modify("model/init=LecunUniform").unwrap();
        let s = Settings::from_config(&c).unwrap();
        assert_eq!((s.height, s.width), (5, 64));
        assert_eq!(s.device, Device::Threads(2));
        assert_eq!(s.workers, 0);
        assert_eq!(s.init, Initializer::LecunUniform);
        assert_eq!(s.probe_config().comparison, Comparison::Tolerance(0.25));
    }

    #[test]
    fn invalid_values() {
        for cmd in [
            "image/width=0",
            "image/height=-4",
            "probe/tolerance=-1.0",
            "device/kind=\"gpu\"",
            "model/dnn=\"[]\"",
            "model/dnn=\"[Dense(64)]\"",
            "model/init=Kaiming",
        ] {
            let mut c = default_config();
            c.modify(cmd).unwrap();
            assert!(Settings::from_config(&c).is_err(), "{cmd}");
        }
    }
}

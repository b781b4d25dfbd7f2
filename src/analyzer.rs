use std::path::{Path, PathBuf};

use anyhow::{Error, Result};
use tracing::{info, warn};

use crate::checkpoint::{self, Checkpoint};
use crate::export;
use crate::nn::Sequential;
use crate::probe::{InfluenceMap, ProbeContext, ProbeRunner, IMPULSE_CHANNELS};
use crate::settings::Settings;

pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Owns the network under analysis, restored from the newest checkpoint in
/// the model directory when there is one
pub struct Analyzer {
    settings: Settings,
    step: usize,
    epoch: usize,
    dnn: Sequential,
}

impl Analyzer {
    pub fn new(settings: Settings) -> Result<Self> {
        let (step, epoch, dnn) = match checkpoint::latest(&settings.model_dir)? {
            Some(path) => {
                let ckpt = Checkpoint::load(&path)?;
                if ckpt.dnn.specs() != settings.dnn.as_slice() || ckpt.dnn.in_channels() != IMPULSE_CHANNELS {
                    return Err(Error::msg(format!(
                        "checkpoint {} was saved for a different architecture than model/dnn",
                        path.display()
                    )));
                }
                info!(step = ckpt.step, epoch = ckpt.epoch, "loaded checkpoint {}", path.display());
                (ckpt.step, ckpt.epoch, ckpt.dnn)
            }
            None => {
                warn!(
                    init = ?settings.init,
                    "no checkpoint in {}, probing a freshly initialized network",
                    settings.model_dir.display()
                );
                (0, 0, Sequential::build(&settings.dnn, IMPULSE_CHANNELS, settings.init)?)
            }
        };
        info!(
            layers = dnn.len(),
            params = dnn.num_params(),
            "network parameters take {}",
            human_bytes(dnn.num_bytes())
        );
        Ok(Analyzer { settings, step, epoch, dnn })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model_dir(&self) -> &Path {
        &self.settings.model_dir
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn dnn(&self) -> &Sequential {
        &self.dnn
    }

    pub fn probe(&self) -> Result<InfluenceMap> {
        let s = &self.settings;
        let ctx = ProbeContext::new(&self.dnn, s.device);
        ProbeRunner::new(ctx, s.height, s.width, s.probe_config())?.run()
    }

    /// Probes the network and writes the map to `filename` in the model dir
    pub fn run(&self, filename: &Path) -> Result<PathBuf> {
        let map = self.probe()?;
        let path = self.model_dir().join(filename);
        export::save(&map, &path)?;
        info!("receptive field written to {}", path.display());
        Ok(path)
    }
}

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::nn::Sequential;

pub const EXTENSION: &str = "ckpt";

/// Trained network state, stored as `<step>.ckpt` in the model directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: usize,
    pub epoch: usize,
    pub dnn: Sequential,
}

impl Checkpoint {
    pub fn path(dir: &Path, step: usize) -> PathBuf {
        dir.join(format!("{step}.{EXTENSION}"))
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("creating model dir {}", dir.display()))?;
        let path = Self::path(dir, self.step);
        let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush().with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).with_context(|| format!("opening checkpoint {}", path.display()))?;
        let ckpt = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("decoding checkpoint {}", path.display()))?;
        Ok(ckpt)
    }
}

/// Highest step `<step>.ckpt` in `dir`, `None` when there is none or the dir
/// does not exist. Files with other names are ignored.
pub fn latest(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut best: Option<(usize, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let step = match path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<usize>().ok()) {
            Some(step) => step,
            None => continue,
        };
        if best.as_ref().map_or(true, |(b, _)| step > *b) {
            best = Some((step, path));
        }
    }
    Ok(best.map(|(_, p)| p))
}

use anyhow::{Error, Result};
use ndarray::prelude::*;

use crate::nn::FeatureExtractor;

pub fn available_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Where a network forward pass executes.
///
/// `Threads(n)` cuts each batch into at most `n` contiguous chunks along the
/// batch axis, runs them on scoped threads and stitches the outputs back in
/// order. Networks that compute every sample independently give bit-identical
/// results on every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Threads(usize),
}

impl Device {
    /// Uses every available core when there is more than one
    pub fn auto() -> Self {
        match available_parallelism() {
            n if n > 1 => Device::Threads(n),
            _ => Device::Cpu,
        }
    }

    /// `kind` is one of `auto`, `cpu` or `threads`, a negative `threads`
    /// means one thread per available core
    pub fn parse(kind: &str, threads: isize) -> Result<Self> {
        match kind {
            "auto" => Ok(Device::auto()),
            "cpu" => Ok(Device::Cpu),
            "threads" => match threads {
                t if t < 0 => Ok(Device::Threads(available_parallelism())),
                0 => Err(Error::msg("device threads cannot be zero")),
                t => Ok(Device::Threads(t as usize)),
            },
            other => Err(Error::msg(format!("unknown device kind {other:?}, expected auto, cpu or threads"))),
        }
    }

    pub fn threads(&self) -> usize {
        match self {
            Device::Cpu => 1,
            Device::Threads(n) => *n,
        }
    }

    pub fn forward<N>(&self, network: &N, batch: ArrayView4<f32>) -> Result<Array4<f32>>
    where
        N: FeatureExtractor + Sync + ?Sized,
    {
        let len = batch.len_of(Axis(0));
        let threads = self.threads();
        if threads <= 1 || len <= 1 {
            return network.forward(batch);
        }

        let chunk = (len + threads - 1) / threads;
        let outputs = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = batch
                .axis_chunks_iter(Axis(0), chunk)
                .map(|part| s.spawn(move |_| network.forward(part)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(Error::msg("device thread panicked"))))
                .collect::<Vec<_>>()
        })
        .map_err(|_| Error::msg("device thread panicked"))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
        Ok(ndarray::concatenate(Axis(0), &views)?)
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::auto()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nn::{parse_specs, Initializer, Sequential};

    #[test]
    fn parse_kinds() {
        assert_eq!(Device::parse("cpu", 4).unwrap(), Device::Cpu);
        assert_eq!(Device::parse("threads", 3).unwrap(), Device::Threads(3));
        assert_eq!(Device::parse("threads", -1).unwrap(), Device::Threads(available_parallelism()));
        assert!(Device::parse("threads", 0).is_err());
        assert!(Device::parse("cuda", 1).is_err());
    }

    #[test]
    fn threads_match_cpu() {
        let specs = parse_specs("[Conv(out: 3, kernel: 3, pad: 1), Relu, MaxPool(kernel: 2)]").unwrap();
        let net = Sequential::build(&specs, 3, Initializer::HeNormal).unwrap();
        let x = crate::nn::randn((7, 3, 8, 8));
        let cpu = Device::Cpu.forward(&net, x.view()).unwrap();
        for n in [2, 3, 7, 16] {
            let threaded = Device::Threads(n).forward(&net, x.view()).unwrap();
            assert_eq!(threaded, cpu, "threads = {n}");
        }
    }

    #[test]
    fn errors_propagate() {
        let failing = |_: ArrayView4<f32>| -> Result<Array4<f32>> { Err(Error::msg("boom")) };
        let x = Array4::<f32>::zeros((4, 3, 2, 2));
        assert!(Device::Threads(2).forward(&failing, x.view()).is_err());
        assert!(Device::Cpu.forward(&failing, x.view()).is_err());
    }
}

use anyhow::Result;
use ndarray::prelude::*;
use tracing::{debug, info};

use super::impulse;
use super::map::InfluenceMap;
use crate::datasets::{BatchLoader, Dataset, ImpulseDataset};
use crate::device::Device;
use crate::error::ProbeError;
use crate::nn::FeatureExtractor;

/// How a probed feature vector is compared against the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    /// Bit for bit equality on every channel
    Exact,
    /// Every channel within this absolute distance of the baseline
    Tolerance(f32),
}

impl Comparison {
    /// A tolerance of zero (or below) means exact comparison
    pub fn from_tolerance(tolerance: f32) -> Self {
        if tolerance > 0.0 {
            Comparison::Tolerance(tolerance)
        } else {
            Comparison::Exact
        }
    }

    pub fn unchanged(&self, features: ArrayView1<f32>, baseline: ArrayView1<f32>) -> bool {
        let mut pairs = features.iter().zip(baseline.iter());
        match *self {
            Comparison::Exact => pairs.all(|(a, b)| a == b),
            Comparison::Tolerance(t) => pairs.all(|(a, b)| (a - b).abs() <= t),
        }
    }
}

impl Default for Comparison {
    fn default() -> Self {
        Comparison::Exact
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeConfig {
    pub batch_size: usize,
    /// Prefetch workers of the batch loader, 0 loads batches inline
    pub workers: usize,
    pub comparison: Comparison,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig { batch_size: 16, workers: 0, comparison: Comparison::Exact }
    }
}

/// The network to probe together with the device it runs on
pub struct ProbeContext<'a, N: ?Sized> {
    pub network: &'a N,
    pub device: Device,
}

impl<'a, N: FeatureExtractor + Sync + ?Sized> ProbeContext<'a, N> {
    pub fn new(network: &'a N, device: Device) -> Self {
        ProbeContext { network, device }
    }

    pub fn forward(&self, batch: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.device.forward(self.network, batch)
    }
}

/// Brute force receptive field measurement: every pixel of the canvas is
/// lit on its own and the features at the center of the output are compared
/// against those of an all-zero image.
pub struct ProbeRunner<'a, N: ?Sized> {
    ctx: ProbeContext<'a, N>,
    dataset: ImpulseDataset,
    config: ProbeConfig,
    location: (usize, usize),
    /// (channels, rows, cols) of the network output
    feature_shape: (usize, usize, usize),
    baseline: Array1<f32>,
}

impl<'a, N: FeatureExtractor + Sync + ?Sized> ProbeRunner<'a, N> {
    /// Runs the zero image once to fix the probe location and the baseline
    pub fn new(ctx: ProbeContext<'a, N>, height: usize, width: usize, config: ProbeConfig) -> Result<Self> {
        let dataset = ImpulseDataset::new(height, width)?;
        let output = ctx.forward(impulse::zeros(height, width).view())?;
        let (n, channels, rows, cols) = output.dim();
        if n != 1 {
            return Err(ProbeError::BatchMismatch { expected: 1, got: n }.into());
        }
        if channels == 0 || rows == 0 || cols == 0 {
            return Err(ProbeError::EmptyFeatureMap { channels, rows, cols }.into());
        }
        let location = (rows / 2, cols / 2);
        let baseline = output.slice(s![0, .., location.0, location.1]).to_owned();
        info!(
            height,
            width,
            channels,
            rows,
            cols,
            row = location.0,
            col = location.1,
            "probing feature location"
        );
        Ok(ProbeRunner {
            ctx,
            dataset,
            config,
            location,
            feature_shape: (channels, rows, cols),
            baseline,
        })
    }

    pub fn location(&self) -> (usize, usize) {
        self.location
    }

    pub fn baseline(&self) -> ArrayView1<f32> {
        self.baseline.view()
    }

    fn check_output(&self, output: &Array4<f32>, expected: usize) -> Result<(), ProbeError> {
        let (n, channels, rows, cols) = output.dim();
        if n != expected {
            return Err(ProbeError::BatchMismatch { expected, got: n });
        }
        if (channels, rows, cols) != self.feature_shape {
            return Err(ProbeError::ShapeChanged { expected: self.feature_shape, got: (channels, rows, cols) });
        }
        Ok(())
    }

    /// Probes every pixel once, any failure aborts the whole pass
    pub fn run(&self) -> Result<InfluenceMap> {
        let (height, width) = self.dataset.dim();
        let (row, col) = self.location;
        let loader = BatchLoader::new(self.dataset, self.config.batch_size, self.config.workers)?;
        let total = loader.num_batches();
        let mut map = InfluenceMap::new(height, width);
        let mut done = 0;

        loader.for_each(|coords| {
            let images = impulse::impulse_batch(&coords, height, width)?;
            let output = self.ctx.forward(images.view())?;
            drop(images);
            self.check_output(&output, coords.len())?;
            for (coord, features) in coords.iter().zip(output.outer_iter()) {
                let unchanged = self
                    .config
                    .comparison
                    .unchanged(features.slice(s![.., row, col]), self.baseline.view());
                map.set(coord.row, coord.col, unchanged);
            }

            done += 1;
            debug!(batch = done, total, "probed batch");
            if done * 10 / total != (done - 1) * 10 / total {
                info!("probed {done}/{total} batches");
            }
            Ok(())
        })?;

        if !map.is_complete() {
            return Err(ProbeError::IncompleteMap { visited: map.visited(), expected: self.dataset.len() }.into());
        }
        match map.influenced_bounds() {
            Some(b) => info!(
                influenced = map.influenced_count(),
                top = b.top,
                left = b.left,
                bottom = b.bottom,
                right = b.right,
                "receptive field spans {}x{} pixels",
                b.height(),
                b.width()
            ),
            None => info!("no pixel changed the probed features"),
        }
        Ok(map)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nn::{parse_specs, Conv2d, Initializer, Sequential};
    use crate::probe::Bounds;
    use anyhow::Error;

    fn probe<N: FeatureExtractor + Sync + ?Sized>(net: &N, h: usize, w: usize, config: ProbeConfig) -> InfluenceMap {
        ProbeRunner::new(ProbeContext::new(net, Device::Cpu), h, w, config)
            .unwrap()
            .run()
            .unwrap()
    }

    fn conv3x3(filter: Array2<f32>) -> Conv2d {
        // same 3x3 kernel on each of the three input channels, one output channel
        let filter = filter.broadcast((1, 3, 3, 3)).unwrap().to_owned();
        Conv2d::from_weights(filter, None, [1, 1], [1, 1]).unwrap()
    }

    fn influenced(map: &InfluenceMap) -> Vec<(usize, usize)> {
        map.view()
            .indexed_iter()
            .filter(|(_, unchanged)| !**unchanged)
            .map(|(rc, _)| rc)
            .collect()
    }

    #[test]
    fn single_conv_covers_kernel() {
        let conv = conv3x3(Array2::ones((3, 3)));
        let net = move |x: ArrayView4<f32>| conv.forward(x);
        let runner = ProbeRunner::new(ProbeContext::new(&net, Device::Cpu), 5, 5, ProbeConfig::default()).unwrap();
        assert_eq!(runner.location(), (2, 2));
        let map = runner.run().unwrap();
        let expected: Vec<_> = (1..4).flat_map(|r| (1..4).map(move |c| (r, c))).collect();
        assert_eq!(influenced(&map), expected);
        assert!(map.is_complete());
    }

    #[test]
    fn five_by_five_conv_covers_kernel() {
        let filter = Array4::ones((1, 3, 5, 5));
        let conv = Conv2d::from_weights(filter, None, [1, 1], [2, 2]).unwrap();
        let net = move |x: ArrayView4<f32>| conv.forward(x);
        let runner = ProbeRunner::new(ProbeContext::new(&net, Device::Cpu), 9, 9, ProbeConfig::default()).unwrap();
        assert_eq!(runner.location(), (4, 4));
        let map = runner.run().unwrap();
        assert_eq!(map.influenced_count(), 25);
        assert_eq!(map.influenced_bounds(), Some(Bounds { top: 2, left: 2, bottom: 6, right: 6 }));
    }

    #[test]
    fn identity_like_kernel_only_sees_center() {
        // zero weights contribute exactly nothing, so only the center tap registers
        let mut filter = Array2::zeros((3, 3));
        filter[[1, 1]] = 1.0;
        let conv = conv3x3(filter);
        let net = move |x: ArrayView4<f32>| conv.forward(x);
        let map = probe(&net, 5, 5, ProbeConfig::default());
        assert_eq!(influenced(&map), vec![(2, 2)]);
    }

    #[test]
    fn flattening_network_sees_everything() {
        let net = |x: ArrayView4<f32>| -> Result<Array4<f32>> {
            let b = x.len_of(Axis(0));
            Ok(x.to_owned().into_shape((b, 27, 1, 1))?)
        };
        let runner = ProbeRunner::new(ProbeContext::new(&net, Device::Cpu), 3, 3, ProbeConfig::default()).unwrap();
        assert_eq!(runner.location(), (0, 0));
        assert_eq!(runner.baseline().len(), 27);
        let map = runner.run().unwrap();
        assert_eq!(map.influenced_count(), 9);
        assert!(map.view().iter().all(|unchanged| !unchanged));
    }

    #[test]
    fn constant_network_sees_nothing() {
        let net = |x: ArrayView4<f32>| -> Result<Array4<f32>> { Ok(Array4::ones((x.len_of(Axis(0)), 2, 3, 3))) };
        let map = probe(&net, 4, 6, ProbeConfig::default());
        assert_eq!(map.influenced_count(), 0);
        assert_eq!(map.influenced_bounds(), None);
    }

    #[test]
    fn baseline_matches_itself() {
        let specs = parse_specs("[Conv(out: 4, kernel: 3, pad: 1), Relu]").unwrap();
        let net = Sequential::build(&specs, 3, Initializer::HeNormal).unwrap();
        let runner = ProbeRunner::new(ProbeContext::new(&net, Device::Cpu), 6, 6, ProbeConfig::default()).unwrap();
        assert!(Comparison::Exact.unchanged(runner.baseline(), runner.baseline()));
    }

    #[test]
    fn every_canvas_is_exhausted() {
        let specs = parse_specs("[Conv(out: 2, kernel: 3, pad: 1), Relu, Conv(out: 2, kernel: 3, pad: 1)]").unwrap();
        let net = Sequential::build(&specs, 3, Initializer::HeNormal).unwrap();
        for (h, w) in [(1, 1), (1, 7), (4, 3), (6, 6)] {
            let map = probe(&net, h, w, ProbeConfig { batch_size: 5, ..Default::default() });
            assert_eq!(map.dim(), (h, w));
            assert_eq!(map.visited(), h * w);
            assert!(map.is_complete());
        }
    }

    #[test]
    fn batch_size_workers_and_device_do_not_matter() {
        let specs = parse_specs("[Conv(out: 4, kernel: 3, pad: 1), Relu, MaxPool(kernel: 2), Conv(out: 3, kernel: 3, pad: 1)]").unwrap();
        let net = Sequential::build(&specs, 3, Initializer::HeNormal).unwrap();
        let reference = probe(&net, 12, 10, ProbeConfig { batch_size: 1, ..Default::default() });
        assert!(reference.influenced_count() > 0);

        for (batch_size, workers) in [(64, 0), (7, 2), (16, 3)] {
            let config = ProbeConfig { batch_size, workers, ..Default::default() };
            assert_eq!(probe(&net, 12, 10, config), reference);
        }
        let threaded = ProbeRunner::new(ProbeContext::new(&net, Device::Threads(3)), 12, 10, ProbeConfig::default())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(threaded, reference);
        // repeated runs are bit identical
        assert_eq!(probe(&net, 12, 10, ProbeConfig::default()), reference);
    }

    #[test]
    fn tolerance_hides_small_changes() {
        let conv = conv3x3(Array2::ones((3, 3)));
        let net = move |x: ArrayView4<f32>| conv.forward(x);
        let loose = ProbeConfig { comparison: Comparison::from_tolerance(10.0), ..Default::default() };
        assert_eq!(probe(&net, 5, 5, loose).influenced_count(), 0);
        let exact = ProbeConfig { comparison: Comparison::from_tolerance(0.0), ..Default::default() };
        assert_eq!(probe(&net, 5, 5, exact).influenced_count(), 9);
    }

    #[test]
    fn precondition_failures() {
        let empty = |x: ArrayView4<f32>| -> Result<Array4<f32>> { Ok(Array4::zeros((x.len_of(Axis(0)), 4, 0, 2))) };
        let err = ProbeRunner::new(ProbeContext::new(&empty, Device::Cpu), 3, 3, ProbeConfig::default()).err().unwrap();
        assert_eq!(
            err.downcast_ref::<ProbeError>(),
            Some(&ProbeError::EmptyFeatureMap { channels: 4, rows: 0, cols: 2 })
        );

        let identity = |x: ArrayView4<f32>| -> Result<Array4<f32>> { Ok(x.to_owned()) };
        let err = ProbeRunner::new(ProbeContext::new(&identity, Device::Cpu), 0, 3, ProbeConfig::default()).err().unwrap();
        assert_eq!(err.downcast_ref::<ProbeError>(), Some(&ProbeError::EmptyCanvas { height: 0, width: 3 }));

        let single = |_: ArrayView4<f32>| -> Result<Array4<f32>> { Ok(Array4::zeros((1, 2, 3, 3))) };
        let runner = ProbeRunner::new(ProbeContext::new(&single, Device::Cpu), 3, 3, ProbeConfig::default()).unwrap();
        let err = runner.run().unwrap_err();
        assert_eq!(err.downcast_ref::<ProbeError>(), Some(&ProbeError::BatchMismatch { expected: 9, got: 1 }));

        let failing = |x: ArrayView4<f32>| -> Result<Array4<f32>> {
            if x.len_of(Axis(0)) > 1 {
                Err(Error::msg("out of memory"))
            } else {
                Ok(x.to_owned())
            }
        };
        let runner = ProbeRunner::new(ProbeContext::new(&failing, Device::Cpu), 3, 3, ProbeConfig::default()).unwrap();
        assert!(runner.run().is_err());
    }
}

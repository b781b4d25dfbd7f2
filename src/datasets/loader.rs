use anyhow::{Error, Result};
use crossbeam::channel::{bounded, Receiver};
use tracing::debug;

use super::Dataset;
use crate::error::ProbeError;

/// Batches a worker may have queued ahead of the consumer
const PREFETCH: usize = 2;

/// Groups a dataset into consecutive batches of `batch_size` points, the last
/// batch may be shorter. With `workers > 0` batches are assembled ahead of time
/// on scoped worker threads, but are still handed out in dataset order.
pub struct BatchLoader<D> {
    dataset: D,
    batch_size: usize,
    workers: usize,
}

impl<D: Dataset> BatchLoader<D> {
    pub fn new(dataset: D, batch_size: usize, workers: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::msg("batch size cannot be zero"));
        }
        Ok(BatchLoader { dataset, batch_size, workers })
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    fn batch(&self, b: usize) -> Vec<D::DataPoint> {
        let start = b * self.batch_size;
        let end = (start + self.batch_size).min(self.dataset.len());
        (start..end).map(|i| self.dataset.get(i)).collect()
    }

    /// Feeds every batch to `f` in order, stopping at the first error
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Vec<D::DataPoint>) -> Result<()>,
        D: Sync,
        D::DataPoint: Send,
    {
        let num_batches = self.num_batches();
        if self.workers == 0 {
            for b in 0..num_batches {
                f(self.batch(b))?;
            }
            return Ok(());
        }

        let workers = self.workers;
        debug!(workers, num_batches, "starting batch prefetch");
        crossbeam::thread::scope(|s| {
            let mut receivers = Vec::with_capacity(workers);
            for w in 0..workers {
                let (send, recv) = bounded(PREFETCH);
                receivers.push(recv);
                s.spawn(move |_| {
                    for b in (w..num_batches).step_by(workers) {
                        // consumer hung up, nothing left to do
                        if send.send(self.batch(b)).is_err() {
                            break;
                        }
                    }
                });
            }
            let result = drain(&receivers, num_batches, &mut f);
            // unblocks any worker still waiting on a full channel
            drop(receivers);
            result
        })
        .map_err(|_| Error::msg("batch loader worker panicked"))?
    }
}

fn drain<T, F>(receivers: &[Receiver<Vec<T>>], num_batches: usize, f: &mut F) -> Result<()>
where
    F: FnMut(Vec<T>) -> Result<()>,
{
    for b in 0..num_batches {
        let batch = receivers[b % receivers.len()]
            .recv()
            .map_err(|_| ProbeError::LoaderDisconnected)?;
        f(batch)?;
    }
    Ok(())
}

use std::sync::{Arc, Mutex, PoisonError};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;
use tracing::info;

use super::{
    rdd::{Data, Dataset, Plan, Source},
    task::Task,
    transport::Transport,
};
use crate::{
    error::{require_positive, CaptureError, Error, Result},
    Config,
};

/// Entry point: owns the transport and builds root datasets.
///
/// Cloning is cheap, every clone talks to the same transport.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    transport: Arc<dyn Transport>,
    config: Config,
    /// repartition seeds are drawn from here
    seeds: Mutex<StdRng>,
}

impl Context {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: Config) -> Self {
        let seeds = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner: Arc::new(ContextInner {
                transport: Arc::new(transport),
                config,
                seeds: Mutex::new(seeds),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub async fn worker_count(&self) -> Result<usize> {
        self.inner
            .transport
            .worker_count()
            .await
            .map_err(Error::Remote)
    }

    /// Dataset with zero partitions.
    pub fn empty_rdd<T: Data>(&self) -> Dataset<T> {
        Dataset::new(self.clone(), Plan::Create(Source::Empty))
    }

    /// Spreads `items` over as many partitions as the configured default, or
    /// the worker count when nothing is configured. The worker count is asked
    /// for when the dataset's descriptor is built, not here.
    pub fn parallelize<T: Data>(&self, items: Vec<T>) -> Result<Dataset<T>> {
        self.memory_dataset(items, None)
    }

    pub fn parallelize_slices<T: Data>(
        &self,
        items: Vec<T>,
        num_slices: usize,
    ) -> Result<Dataset<T>> {
        let num_slices = require_positive("num_slices", num_slices)?;
        self.memory_dataset(items, Some(num_slices))
    }

    fn memory_dataset<T: Data>(&self, items: Vec<T>, slices: Option<usize>) -> Result<Dataset<T>> {
        let items = items
            .into_iter()
            .map(|item| serde_json::to_value(item).map_err(CaptureError::Element))
            .collect::<Result<Vec<Value>, _>>()?;
        Ok(Dataset::new(
            self.clone(),
            Plan::Create(Source::Memory { items, slices }),
        ))
    }

    pub(crate) async fn default_slices(&self) -> Result<usize> {
        match self.inner.config.default_slices {
            Some(slices) => require_positive("default_slices", slices),
            None => require_positive("worker count", self.worker_count().await?),
        }
    }

    pub(crate) fn draw_seed(&self) -> u32 {
        self.inner
            .seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen()
    }

    pub(crate) async fn submit(&self, task: Task) -> Result<Value> {
        info!(kind = %task.kind(), depth = task.depth(), "submitting task");
        self.inner
            .transport
            .request(task)
            .await
            .map_err(Error::Remote)
    }
}

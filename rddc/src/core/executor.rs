//! In-process execution of task descriptors.
//!
//! [`LocalTransport`] plays both the master and its workers: it pushes every
//! descriptor through the same byte encoding a remote master would receive,
//! then evaluates the chain on the blocking pool.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use super::{
    capture::Partition,
    task::{CreateTask, Task},
    transport::Transport,
};
use crate::error::{TaskError, TransportError};

#[derive(Clone)]
pub struct LocalTransport {
    workers: usize,
    /// one permit per worker, held for the whole task
    permits: Arc<Semaphore>,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl LocalTransport {
    /// `workers` is reported as the worker count and bounds how many
    /// descriptors run at once. Zero is bumped to one.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn request(&self, task: Task) -> Result<Value, TransportError> {
        let bytes = task.to_bytes()?;
        debug!(len = bytes.len(), kind = %task.kind(), "received task");
        let task = Task::from_bytes(&bytes)?;

        let permit = self.permits.clone().acquire_owned().await?;
        let result = tokio::task::spawn_blocking(move || {
            let result = execute(&task);
            drop(permit);
            result
        })
        .await?;
        Ok(result?)
    }

    async fn worker_count(&self) -> Result<usize, TransportError> {
        Ok(self.workers)
    }
}

/// Runs a descriptor whose root is a REDUCE and returns the final value.
pub fn execute(task: &Task) -> Result<Value, TaskError> {
    let reduce = match task {
        Task::Reduce(reduce) => reduce,
        other => {
            return Err(TaskError::Malformed(format!(
                "expected a REDUCE at the root, got {}",
                other.kind()
            )))
        }
    };
    let partitions = materialize(&reduce.sub_request)?;
    let partials = partitions
        .into_iter()
        .map(|partition| reduce.partition_func.call(partition))
        .collect::<Result<Vec<_>, _>>()?;
    reduce.final_func.call(partials)
}

/// Computes every partition of a CREATE/MAP/REPARTITION chain.
pub fn materialize(task: &Task) -> Result<Vec<Partition>, TaskError> {
    match task {
        Task::Create(create) => create_partitions(create),
        Task::Map(map) => {
            let partitions = materialize(&map.sub_request)?;
            trace!(partitions = partitions.len(), "MAP");
            partitions
                .into_iter()
                .map(|partition| map.func.call(partition))
                .collect()
        }
        Task::Repartition(repartition) => {
            let partitions = materialize(&repartition.sub_request)?;
            let num_partitions = repartition.num_partitions;
            if num_partitions == 0 {
                return Err(TaskError::Malformed("REPARTITION into zero partitions".into()));
            }
            trace!(from = partitions.len(), to = num_partitions, "REPARTITION");
            // source partitions are walked in order, so every bucket keeps
            // (source partition, position) order
            let mut buckets = empty_partitions(num_partitions)?;
            for partition in partitions {
                for element in partition {
                    let index = repartition.partition_func.call(&element)?;
                    let bucket = buckets.get_mut(index).ok_or(TaskError::OutOfRange {
                        index,
                        partitions: num_partitions,
                    })?;
                    bucket.push(element);
                }
            }
            Ok(buckets)
        }
        Task::Reduce(_) => Err(TaskError::Malformed(
            "REDUCE can only be the root of a descriptor".into(),
        )),
    }
}

/// Partition counts come straight from the descriptor, so a count too large
/// to allocate is reported instead of aborting the worker.
fn empty_partitions(count: usize) -> Result<Vec<Partition>, TaskError> {
    let mut partitions: Vec<Partition> = Vec::new();
    partitions
        .try_reserve_exact(count)
        .map_err(|e| TaskError::Malformed(format!("can't allocate {count} partitions: {e}")))?;
    partitions.resize_with(count, Vec::new);
    Ok(partitions)
}

fn create_partitions(create: &CreateTask) -> Result<Vec<Partition>, TaskError> {
    match (&create.creator, &create.args) {
        (None, _) => empty_partitions(create.partition_count),
        (Some(creator), Some(args)) if args.len() == create.partition_count => args
            .iter()
            .map(|arg| creator.call(arg.clone()))
            .collect(),
        (Some(_), args) => Err(TaskError::Malformed(format!(
            "CREATE with {} partitions got {} args",
            create.partition_count,
            args.as_ref().map_or(0, Vec::len)
        ))),
    }
}

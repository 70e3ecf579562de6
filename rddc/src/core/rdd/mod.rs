use std::{fmt, marker::PhantomData, sync::Arc};

use async_recursion::async_recursion;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{
    capture::{AssignFn, Capture, CapturedFn, CreatorFn, Env, Partition, PartitionFn},
    context::Context,
    split::split_balanced,
    task::{CreateTask, MapTask, RepartitionTask, Task, TaskKind},
};
use crate::error::{Result, TaskError};

pub trait Data: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Data for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Node of the lazy graph. Owns a shared reference to its parent, never changes
/// once built.
pub(crate) enum Plan {
    Create(Source),
    Map {
        parent: Arc<Plan>,
        func: CapturedFn<PartitionFn>,
    },
    Repartition {
        parent: Arc<Plan>,
        num_partitions: usize,
        partition_func: CapturedFn<AssignFn>,
    },
}

pub(crate) enum Source {
    Empty,
    Memory {
        items: Vec<Value>,
        /// `None` means "ask when the descriptor is built"
        slices: Option<usize>,
    },
}

impl Plan {
    fn kind(&self) -> TaskKind {
        match self {
            Plan::Create(_) => TaskKind::Create,
            Plan::Map { .. } => TaskKind::Map,
            Plan::Repartition { .. } => TaskKind::Repartition,
        }
    }

    fn depth(&self) -> usize {
        match self {
            Plan::Create(_) => 1,
            Plan::Map { parent, .. } | Plan::Repartition { parent, .. } => parent.depth() + 1,
        }
    }

    /// Builds the descriptor for this node and all of its ancestors.
    #[async_recursion]
    pub(crate) async fn task(&self, ctx: &Context) -> Result<Task> {
        let task = match self {
            Plan::Create(Source::Empty) => Task::Create(CreateTask::empty()),
            Plan::Create(Source::Memory { items, slices }) => {
                let num_slices = match slices {
                    Some(n) => *n,
                    None => ctx.default_slices().await?,
                };
                let slices = split_balanced(items, num_slices)?
                    .into_iter()
                    .map(Value::Array)
                    .collect();
                let creator = Capture::new(memory_creator as CreatorFn).seal(&[])?;
                Task::Create(CreateTask::memory(creator, slices))
            }
            Plan::Map { parent, func } => Task::Map(MapTask {
                sub_request: Box::new(parent.task(ctx).await?),
                func: func.clone(),
            }),
            Plan::Repartition {
                parent,
                num_partitions,
                partition_func,
            } => Task::Repartition(RepartitionTask {
                sub_request: Box::new(parent.task(ctx).await?),
                num_partitions: *num_partitions,
                partition_func: partition_func.clone(),
            }),
        };
        Ok(task)
    }
}

/// Partition `i` of a parallelized collection is literally `args[i]`.
fn memory_creator(_env: &Env, slice: Value) -> Result<Partition, TaskError> {
    match slice {
        Value::Array(items) => Ok(items),
        other => Err(TaskError::Malformed(format!(
            "memory slice must be an array, got {other}"
        ))),
    }
}

/// Partitioned collection of `T` which may not have been computed yet.
///
/// Transformations return new datasets and never execute anything; actions
/// (`collect`, `count`, ...) compose one descriptor and send it through the
/// context's transport.
pub struct Dataset<T> {
    ctx: Context,
    plan: Arc<Plan>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Dataset {
            ctx: self.ctx.clone(),
            plan: self.plan.clone(),
            _item: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("kind", &self.plan.kind())
            .field("depth", &self.plan.depth())
            .finish()
    }
}

impl<T: Data> Dataset<T> {
    pub(crate) fn new(ctx: Context, plan: Plan) -> Self {
        Dataset {
            ctx,
            plan: Arc::new(plan),
            _item: PhantomData,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Descriptor computing this dataset. Building it twice gives equivalent
    /// descriptors.
    pub async fn task(&self) -> Result<Task> {
        self.plan.task(&self.ctx).await
    }

    pub(crate) fn with_map<U: Data>(&self, func: CapturedFn<PartitionFn>) -> Dataset<U> {
        debug!(env = ?func.env(), "new MAP node");
        Dataset::new(
            self.ctx.clone(),
            Plan::Map {
                parent: self.plan.clone(),
                func,
            },
        )
    }

    pub(crate) fn with_repartition(
        &self,
        num_partitions: usize,
        partition_func: CapturedFn<AssignFn>,
    ) -> Dataset<T> {
        debug!(num_partitions, env = ?partition_func.env(), "new REPARTITION node");
        Dataset::new(
            self.ctx.clone(),
            Plan::Repartition {
                parent: self.plan.clone(),
                num_partitions,
                partition_func,
            },
        )
    }
}

/// Element decoding shared by shipped entries.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, TaskError> {
    serde_json::from_value(value).map_err(TaskError::Element)
}

pub(crate) fn encode<T: Serialize>(item: T) -> Result<Value, TaskError> {
    serde_json::to_value(item).map_err(TaskError::Element)
}

pub mod map_partitions;

pub mod shuffle_rdd;

pub mod actions;

use std::{fmt, iter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capture::{AssignFn, CapturedFn, CreatorFn, PartitionFn, ReduceFn};

/// One computation step, shipped to the execution layer once per action.
///
/// Every kind except [`Task::Create`] owns exactly one sub request, so a
/// descriptor is always a linear chain ending in a CREATE leaf.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Task {
    Create(CreateTask),
    Map(MapTask),
    Repartition(RepartitionTask),
    Reduce(ReduceTask),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Create,
    Map,
    Repartition,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Create => "CREATE",
            TaskKind::Map => "MAP",
            TaskKind::Repartition => "REPARTITION",
            TaskKind::Reduce => "REDUCE",
        };
        f.write_str(name)
    }
}

/// Where the partitions of a CREATE leaf come from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub partition_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<CapturedFn<CreatorFn>>,
    /// `args[i]` is handed to `creator` to build partition `i`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
}

impl CreateTask {
    /// Zero partitions, not one empty partition.
    pub fn empty() -> Self {
        Self {
            partition_count: 0,
            creator: None,
            args: None,
            source: None,
        }
    }

    pub fn memory(creator: CapturedFn<CreatorFn>, slices: Vec<Value>) -> Self {
        Self {
            partition_count: slices.len(),
            creator: Some(creator),
            args: Some(slices),
            source: Some(SourceKind::Memory),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapTask {
    pub sub_request: Box<Task>,
    pub func: CapturedFn<PartitionFn>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepartitionTask {
    pub sub_request: Box<Task>,
    pub num_partitions: usize,
    pub partition_func: CapturedFn<AssignFn>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceTask {
    pub sub_request: Box<Task>,
    pub partition_func: CapturedFn<ReduceFn>,
    pub final_func: CapturedFn<ReduceFn>,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Create(_) => TaskKind::Create,
            Task::Map(_) => TaskKind::Map,
            Task::Repartition(_) => TaskKind::Repartition,
            Task::Reduce(_) => TaskKind::Reduce,
        }
    }

    pub fn sub_request(&self) -> Option<&Task> {
        match self {
            Task::Create(_) => None,
            Task::Map(t) => Some(&t.sub_request),
            Task::Repartition(t) => Some(&t.sub_request),
            Task::Reduce(t) => Some(&t.sub_request),
        }
    }

    /// This task followed by all of its ancestors, root first.
    pub fn chain(&self) -> impl Iterator<Item = &Task> {
        iter::successors(Some(self), |task| task.sub_request())
    }

    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    pub fn leaf(&self) -> &CreateTask {
        match self {
            Task::Create(create) => create,
            Task::Map(t) => t.sub_request.leaf(),
            Task::Repartition(t) => t.sub_request.leaf(),
            Task::Reduce(t) => t.sub_request.leaf(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

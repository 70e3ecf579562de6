//! Wide transformations: everything that ends up as a REPARTITION descriptor.

use std::{collections::HashMap, hash::Hash};

use serde_json::Value;
use tracing::debug;

use super::{decode, encode, Data, Dataset};
use crate::{
    core::{
        capture::{AssignFn, Capture, CapturedFn, Env, Partition, PartitionFn},
        partitioner::HashPartitioner,
    },
    error::{require_positive, Result, TaskError},
};

impl<T: Data> Dataset<T> {
    /// Routes every element to partition `assign(element)`, which must be
    /// below `num_partitions`.
    pub fn partition_by(
        &self,
        num_partitions: usize,
        assign: fn(&T) -> usize,
    ) -> Result<Dataset<T>> {
        let num_partitions = require_positive("num_partitions", num_partitions)?;
        let partition_func = Capture::new(assign_entry::<T> as AssignFn)
            .bind_fn("f", assign)
            .seal(&["f"])?;
        Ok(self.with_repartition(num_partitions, partition_func))
    }

    pub fn partition_by_captured(
        &self,
        num_partitions: usize,
        partition_func: CapturedFn<AssignFn>,
    ) -> Result<Dataset<T>> {
        let num_partitions = require_positive("num_partitions", num_partitions)?;
        Ok(self.with_repartition(num_partitions, partition_func))
    }

    /// Hash repartition with a seed drawn from the context.
    pub fn repartition(&self, num_partitions: usize) -> Result<Dataset<T>> {
        let seed = self.ctx.draw_seed();
        self.repartition_with_seed(num_partitions, seed)
    }

    pub fn repartition_with_seed(&self, num_partitions: usize, seed: u32) -> Result<Dataset<T>> {
        let partitioner = HashPartitioner::new(num_partitions, seed)?;
        debug!(num_partitions, seed, "repartition");
        let partition_func = Capture::new(hash_entry as AssignFn)
            .bind("partitioner", &partitioner)
            .seal(&["partitioner"])?;
        Ok(self.with_repartition(num_partitions, partition_func))
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Data + Eq + Hash + Clone,
    V: Data,
{
    /// Merges values sharing a key with `f`. Values are combined inside each
    /// partition first, then once more after the shuffle.
    pub fn reduce_by_key(
        &self,
        num_partitions: usize,
        f: fn(V, V) -> V,
    ) -> Result<Dataset<(K, V)>> {
        let combine = Capture::new(combine_entry::<K, V> as PartitionFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        let shuffled = self
            .map_partitions_captured::<(K, V)>(combine.clone())
            .by_key(num_partitions)?;
        Ok(shuffled.map_partitions_captured(combine))
    }

    /// Collects all values of a key into one vector. Values keep the order in
    /// which the shuffle delivered them.
    pub fn group_by_key(&self, num_partitions: usize) -> Result<Dataset<(K, Vec<V>)>> {
        let group = Capture::new(group_entry::<K, V> as PartitionFn).seal(&[])?;
        let merge = Capture::new(merge_groups_entry::<K, V> as PartitionFn).seal(&[])?;
        let shuffled = self
            .map_partitions_captured::<(K, Vec<V>)>(group)
            .by_key(num_partitions)?;
        Ok(shuffled.map_partitions_captured(merge))
    }
}

impl<K: Data, C: Data> Dataset<(K, C)> {
    fn by_key(&self, num_partitions: usize) -> Result<Dataset<(K, C)>> {
        let partitioner = HashPartitioner::new(num_partitions, self.ctx.draw_seed())?;
        let partition_func = Capture::new(key_hash_entry as AssignFn)
            .bind("partitioner", &partitioner)
            .seal(&["partitioner"])?;
        Ok(self.with_repartition(num_partitions, partition_func))
    }
}

fn assign_entry<T: Data>(env: &Env, value: &Value) -> Result<usize, TaskError> {
    let f: fn(&T) -> usize = env.get_fn("f")?;
    let item = T::deserialize(value).map_err(TaskError::Element)?;
    Ok(f(&item))
}

fn hash_entry(env: &Env, value: &Value) -> Result<usize, TaskError> {
    let partitioner: HashPartitioner = env.get("partitioner")?;
    checked(&partitioner)?;
    Ok(partitioner.partition_of(value))
}

/// Pairs travel as two element arrays, only the key decides the partition.
fn key_hash_entry(env: &Env, value: &Value) -> Result<usize, TaskError> {
    let partitioner: HashPartitioner = env.get("partitioner")?;
    checked(&partitioner)?;
    match value {
        Value::Array(pair) if pair.len() == 2 => Ok(partitioner.partition_of(&pair[0])),
        other => Err(TaskError::Malformed(format!(
            "expected a key/value pair, got {other}"
        ))),
    }
}

fn checked(partitioner: &HashPartitioner) -> Result<(), TaskError> {
    if partitioner.partitions_num() == 0 {
        return Err(TaskError::Malformed("partitioner has zero partitions".into()));
    }
    Ok(())
}

/// Folds the values of each key with `merge`, keys ordered by first
/// appearance in the partition.
fn group_pairs<K, C>(
    partition: Partition,
    mut merge: impl FnMut(Option<C>, Value) -> Result<C, TaskError>,
) -> Result<Vec<(K, C)>, TaskError>
where
    K: Data + Eq + Hash + Clone,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut grouped: Vec<(K, Option<C>)> = Vec::new();
    for value in partition {
        let (key, rest) = split_pair::<K>(value)?;
        let slot = match slots.get(&key) {
            Some(&slot) => slot,
            None => {
                slots.insert(key.clone(), grouped.len());
                grouped.push((key, None));
                grouped.len() - 1
            }
        };
        let acc = grouped[slot].1.take();
        grouped[slot].1 = Some(merge(acc, rest)?);
    }
    Ok(grouped
        .into_iter()
        .filter_map(|(key, combined)| combined.map(|c| (key, c)))
        .collect())
}

fn split_pair<K: Data>(value: Value) -> Result<(K, Value), TaskError> {
    match value {
        Value::Array(mut pair) if pair.len() == 2 => {
            let rest = pair.pop().unwrap_or(Value::Null);
            let key = pair.pop().unwrap_or(Value::Null);
            Ok((decode(key)?, rest))
        }
        other => Err(TaskError::Malformed(format!(
            "expected a key/value pair, got {other}"
        ))),
    }
}

fn combine_entry<K, V>(env: &Env, partition: Partition) -> Result<Partition, TaskError>
where
    K: Data + Eq + Hash + Clone,
    V: Data,
{
    let f: fn(V, V) -> V = env.get_fn("f")?;
    let combined = group_pairs::<K, V>(partition, |acc, value| {
        let value: V = decode(value)?;
        Ok(match acc {
            Some(acc) => f(acc, value),
            None => value,
        })
    })?;
    combined.into_iter().map(encode).collect()
}

fn group_entry<K, V>(_env: &Env, partition: Partition) -> Result<Partition, TaskError>
where
    K: Data + Eq + Hash + Clone,
    V: Data,
{
    let grouped = group_pairs::<K, Vec<V>>(partition, |acc, value| {
        let mut values = acc.unwrap_or_default();
        values.push(decode(value)?);
        Ok(values)
    })?;
    grouped.into_iter().map(encode).collect()
}

fn merge_groups_entry<K, V>(_env: &Env, partition: Partition) -> Result<Partition, TaskError>
where
    K: Data + Eq + Hash + Clone,
    V: Data,
{
    let merged = group_pairs::<K, Vec<V>>(partition, |acc, values| {
        let mut merged = acc.unwrap_or_default();
        merged.extend(decode::<Vec<V>>(values)?);
        Ok(merged)
    })?;
    merged.into_iter().map(encode).collect()
}

//! Narrow transformations. All of them are MAP descriptors, they only differ in
//! the entry that gets shipped.

use super::{decode, encode, Data, Dataset};
use crate::{
    core::capture::{Capture, CapturedFn, Env, Partition, PartitionFn},
    error::{Result, TaskError},
};

impl<T: Data> Dataset<T> {
    /// `f` gets one partition's full, ordered contents and returns its
    /// replacement.
    pub fn map_partitions<U: Data>(&self, f: fn(Vec<T>) -> Vec<U>) -> Result<Dataset<U>> {
        let func = Capture::new(map_partitions_entry::<T, U> as PartitionFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        Ok(self.with_map(func))
    }

    /// Same as [`Dataset::map_partitions`] but ships a function the caller
    /// captured itself, together with whatever values it bound.
    pub fn map_partitions_captured<U: Data>(&self, func: CapturedFn<PartitionFn>) -> Dataset<U> {
        self.with_map(func)
    }

    pub fn map<U: Data>(&self, f: fn(T) -> U) -> Result<Dataset<U>> {
        let func = Capture::new(map_entry::<T, U> as PartitionFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        Ok(self.with_map(func))
    }

    /// Keeps elements for which `f` holds, in their original order.
    pub fn filter(&self, f: fn(&T) -> bool) -> Result<Dataset<T>> {
        let func = Capture::new(filter_entry::<T> as PartitionFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        Ok(self.with_map(func))
    }

    pub fn flat_map<U, I>(&self, f: fn(T) -> I) -> Result<Dataset<U>>
    where
        U: Data,
        I: IntoIterator<Item = U> + 'static,
    {
        let func = Capture::new(flat_map_entry::<T, U, I> as PartitionFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        Ok(self.with_map(func))
    }
}

fn map_partitions_entry<T, U>(env: &Env, partition: Partition) -> Result<Partition, TaskError>
where
    T: Data,
    U: Data,
{
    let f: fn(Vec<T>) -> Vec<U> = env.get_fn("f")?;
    let input = partition
        .into_iter()
        .map(decode)
        .collect::<Result<Vec<T>, _>>()?;
    f(input).into_iter().map(encode).collect()
}

fn map_entry<T: Data, U: Data>(env: &Env, partition: Partition) -> Result<Partition, TaskError> {
    let f: fn(T) -> U = env.get_fn("f")?;
    partition
        .into_iter()
        .map(|value| encode(f(decode(value)?)))
        .collect()
}

fn filter_entry<T: Data>(env: &Env, partition: Partition) -> Result<Partition, TaskError> {
    let f: fn(&T) -> bool = env.get_fn("f")?;
    let mut kept = Vec::with_capacity(partition.len());
    for value in partition {
        // the element is shipped on untouched, no need to encode it again
        let item = T::deserialize(&value).map_err(TaskError::Element)?;
        if f(&item) {
            kept.push(value);
        }
    }
    Ok(kept)
}

fn flat_map_entry<T, U, I>(env: &Env, partition: Partition) -> Result<Partition, TaskError>
where
    T: Data,
    U: Data,
    I: IntoIterator<Item = U> + 'static,
{
    let f: fn(T) -> I = env.get_fn("f")?;
    let mut out = Vec::new();
    for value in partition {
        for item in f(decode(value)?) {
            out.push(encode(item)?);
        }
    }
    Ok(out)
}

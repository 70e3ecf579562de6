//! Actions. Each one compiles to a single REDUCE descriptor: a function run
//! once per partition, and a final function run once over the partials in
//! partition order.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use super::{decode, encode, Data, Dataset};
use crate::{
    core::{
        capture::{Capture, CapturedFn, Env, Partition, ReduceFn},
        task::{ReduceTask, Task},
    },
    error::{Error, Result, TaskError},
};

impl<T: Data> Dataset<T> {
    /// Runs a caller-built partition/final pair over this dataset.
    pub async fn reduce_partitions<R: DeserializeOwned>(
        &self,
        partition_func: CapturedFn<ReduceFn>,
        final_func: CapturedFn<ReduceFn>,
    ) -> Result<R> {
        let task = Task::Reduce(ReduceTask {
            sub_request: Box::new(self.task().await?),
            partition_func,
            final_func,
        });
        let result = self.ctx.submit(task).await?;
        serde_json::from_value(result).map_err(Error::Decode)
    }

    /// One vector per partition, in partition order. Not flattened.
    pub async fn collect(&self) -> Result<Vec<Vec<T>>> {
        let identity = Capture::new(gather_entry as ReduceFn).seal(&[])?;
        self.reduce_partitions(identity.clone(), identity).await
    }

    /// First `n` elements in partition order, then in-partition order.
    pub async fn take(&self, n: usize) -> Result<Vec<T>> {
        let truncate = Capture::new(truncate_entry as ReduceFn)
            .bind("n", &n)
            .seal(&["n"])?;
        let concat = Capture::new(take_final_entry as ReduceFn)
            .bind("n", &n)
            .seal(&["n"])?;
        self.reduce_partitions(truncate, concat).await
    }

    pub async fn first(&self) -> Result<Option<T>> {
        Ok(self.take(1).await?.into_iter().next())
    }

    pub async fn count(&self) -> Result<usize> {
        let count = Capture::new(count_entry as ReduceFn).seal(&[])?;
        let sum = Capture::new(sum_entry as ReduceFn).seal(&[])?;
        self.reduce_partitions(count, sum).await
    }

    /// `None` when there are no elements. Null elements never win.
    pub async fn max(&self) -> Result<Option<T>>
    where
        T: PartialOrd,
    {
        let fold = Capture::new(extreme_entry::<T, true> as ReduceFn).seal(&[])?;
        self.reduce_partitions(fold.clone(), fold).await
    }

    /// `None` when there are no elements. Null elements never win.
    pub async fn min(&self) -> Result<Option<T>>
    where
        T: PartialOrd,
    {
        let fold = Capture::new(extreme_entry::<T, false> as ReduceFn).seal(&[])?;
        self.reduce_partitions(fold.clone(), fold).await
    }

    /// Folds all elements with `f`, partitions first, then the partials.
    pub async fn reduce(&self, f: fn(T, T) -> T) -> Result<Option<T>> {
        let fold = Capture::new(fold_entry::<T> as ReduceFn)
            .bind_fn("f", f)
            .seal(&["f"])?;
        self.reduce_partitions(fold.clone(), fold).await
    }
}

fn gather_entry(_env: &Env, values: Partition) -> Result<Value, TaskError> {
    Ok(Value::Array(values))
}

fn truncate_entry(env: &Env, mut partition: Partition) -> Result<Value, TaskError> {
    let n: usize = env.get("n")?;
    partition.truncate(n);
    Ok(Value::Array(partition))
}

fn take_final_entry(env: &Env, partials: Partition) -> Result<Value, TaskError> {
    let n: usize = env.get("n")?;
    let mut taken = Vec::new();
    for partial in partials {
        let items: Vec<Value> = decode(partial)?;
        let missing = n - taken.len();
        if items.len() < missing {
            taken.extend(items);
        } else {
            taken.extend(items.into_iter().take(missing));
            break;
        }
    }
    Ok(Value::Array(taken))
}

fn count_entry(_env: &Env, partition: Partition) -> Result<Value, TaskError> {
    Ok(Value::from(partition.len()))
}

fn sum_entry(_env: &Env, partials: Partition) -> Result<Value, TaskError> {
    let mut total = 0_u64;
    for partial in partials {
        total += decode::<u64>(partial)?;
    }
    Ok(Value::from(total))
}

/// Null is absorbed: it never replaces a value and any value replaces it.
fn absorb_null<T: DeserializeOwned>(
    values: Partition,
    mut pick: impl FnMut(T, T) -> T,
) -> Result<Option<T>, TaskError> {
    let mut best: Option<T> = None;
    for value in values {
        let candidate = Option::<T>::deserialize(&value).map_err(TaskError::Element)?;
        best = match (best, candidate) {
            (Some(best), Some(candidate)) => Some(pick(best, candidate)),
            (best, candidate) => best.or(candidate),
        };
    }
    Ok(best)
}

/// Same fold for partitions and for partials. `MAX` picks the greater value,
/// otherwise the lesser; ties and incomparable values keep the current one.
fn extreme_entry<T: Data + PartialOrd, const MAX: bool>(
    _env: &Env,
    values: Partition,
) -> Result<Value, TaskError> {
    let best = absorb_null::<T>(values, |best, candidate| {
        let better = if MAX { candidate > best } else { candidate < best };
        if better {
            candidate
        } else {
            best
        }
    })?;
    encode(best)
}

fn fold_entry<T: Data>(env: &Env, values: Partition) -> Result<Value, TaskError> {
    let f: fn(T, T) -> T = env.get_fn("f")?;
    encode(absorb_null::<T>(values, f)?)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::{
        core::task::Task, Context, Error, LocalTransport, Transport, TransportError,
    };

    fn ctx() -> Context {
        Context::new(LocalTransport::new(4))
    }

    #[tokio::test]
    async fn empty_dataset_is_the_identity_case() {
        let empty = ctx().empty_rdd::<i32>();
        assert_eq!(empty.count().await.unwrap(), 0);
        assert_eq!(empty.collect().await.unwrap(), Vec::<Vec<i32>>::new());
        assert_eq!(empty.max().await.unwrap(), None);
        assert_eq!(empty.min().await.unwrap(), None);
        assert_eq!(empty.take(5).await.unwrap(), Vec::<i32>::new());
        assert_eq!(empty.first().await.unwrap(), None);
        assert_eq!(empty.reduce(|a, b| a + b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_dataset_has_no_partitions() {
        let task = ctx().empty_rdd::<String>().task().await.unwrap();
        match task {
            Task::Create(create) => {
                assert_eq!(create.partition_count, 0);
                assert!(create.creator.is_none());
                assert!(create.args.is_none());
            }
            other => panic!("expected CREATE, got {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn collect_keeps_partitions_apart() {
        let ds = ctx().parallelize_slices(vec![1, 2, 3, 4, 5], 3).unwrap();
        assert_eq!(
            ds.collect().await.unwrap(),
            vec![vec![1, 2], vec![3, 4], vec![5]]
        );
    }

    #[tokio::test]
    async fn take_walks_partitions_in_order() {
        let ds = ctx().parallelize_slices((0..12).collect::<Vec<u8>>(), 4).unwrap();
        for k in 0..=15 {
            let expected: Vec<u8> = (0..k.min(12) as u8).collect();
            assert_eq!(ds.take(k).await.unwrap(), expected, "take({k})");
        }
    }

    #[tokio::test]
    async fn take_everything() {
        let ds = ctx().parallelize_slices(vec![1, 2, 3], 2).unwrap();
        assert_eq!(ds.take(usize::MAX).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(ds.take(1 << 40).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn take_skips_empty_partitions() {
        let ds = ctx().parallelize_slices(vec!['a', 'b'], 5).unwrap();
        let ds = ds.filter(|c| *c != 'a').unwrap();
        assert_eq!(ds.take(3).await.unwrap(), vec!['b']);
        assert_eq!(ds.first().await.unwrap(), Some('b'));
    }

    #[tokio::test]
    async fn count_after_filter() {
        let ds = ctx().parallelize_slices((1..=100).collect::<Vec<u32>>(), 4).unwrap();
        let even = ds.filter(|x| x % 2 == 0).unwrap();
        assert_eq!(even.count().await.unwrap(), 50);
        assert_eq!(ds.count().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn max_and_min_ignore_the_split() {
        for slices in 1..=4 {
            let ds = ctx().parallelize_slices(vec![5, 3, 9, 1], slices).unwrap();
            assert_eq!(ds.max().await.unwrap(), Some(9), "slices={slices}");
            assert_eq!(ds.min().await.unwrap(), Some(1), "slices={slices}");
        }
    }

    #[tokio::test]
    async fn nulls_never_win() {
        let ds = ctx()
            .parallelize_slices(vec![Value::Null, json!(4), Value::Null, json!(-2)], 4)
            .unwrap();
        let nums = ds.map(|v: Value| v.as_i64()).unwrap();
        assert_eq!(nums.max().await.unwrap(), Some(Some(4)));
        assert_eq!(nums.min().await.unwrap(), Some(Some(-2)));

        let only_nulls = ctx()
            .parallelize_slices(vec![Option::<i32>::None, None], 2)
            .unwrap();
        assert_eq!(only_nulls.max().await.unwrap(), None);
    }

    #[tokio::test]
    async fn float_extremes() {
        let ds = ctx().parallelize_slices(vec![0.5_f64, -1.25, 3.75], 2).unwrap();
        assert_eq!(ds.max().await.unwrap(), Some(3.75));
        assert_eq!(ds.min().await.unwrap(), Some(-1.25));
    }

    #[tokio::test]
    async fn reduce_folds_everything() {
        let ds = ctx().parallelize_slices((1..=10).collect::<Vec<i64>>(), 3).unwrap();
        assert_eq!(ds.reduce(|a, b| a + b).await.unwrap(), Some(55));
        assert_eq!(ds.reduce(|a, b| a.max(b)).await.unwrap(), Some(10));
    }

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn request(&self, _task: Task) -> Result<Value, TransportError> {
            Err("master unreachable".into())
        }

        async fn worker_count(&self) -> Result<usize, TransportError> {
            Err("master unreachable".into())
        }
    }

    #[tokio::test]
    async fn transport_errors_reach_the_caller() {
        let ctx = Context::new(Unreachable);
        let ds = ctx.parallelize_slices(vec![1, 2, 3], 2).unwrap();
        match ds.count().await {
            Err(Error::Remote(e)) => assert_eq!(e.to_string(), "master unreachable"),
            other => panic!("expected a remote error, got {other:?}"),
        }

        // the default slice count needs the worker count, which fails too
        let lazy = ctx.parallelize(vec![1, 2, 3]).unwrap();
        assert!(matches!(lazy.collect().await, Err(Error::Remote(_))));
    }

    #[tokio::test]
    async fn result_of_the_wrong_shape_is_a_decode_error() {
        struct Constant;

        #[async_trait]
        impl Transport for Constant {
            async fn request(&self, _task: Task) -> Result<Value, TransportError> {
                Ok(json!("not a number"))
            }

            async fn worker_count(&self) -> Result<usize, TransportError> {
                Ok(1)
            }
        }

        let ds = Context::new(Constant).parallelize_slices(vec![1], 1).unwrap();
        assert!(matches!(ds.count().await, Err(Error::Decode(_))));
    }
}

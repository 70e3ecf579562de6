use pretty_assertions::assert_eq;
use rddc::{Config, Context, Error, HashPartitioner, LocalTransport, Task};

fn ctx() -> Context {
    Context::new(LocalTransport::new(4))
}

fn sorted<T: Ord>(parts: Vec<Vec<T>>) -> Vec<T> {
    let mut flat: Vec<T> = parts.into_iter().flatten().collect();
    flat.sort();
    flat
}

#[tokio::test]
async fn partition_by_routes_every_element() {
    let ds = ctx()
        .parallelize_slices((0..9).collect::<Vec<u32>>(), 2)
        .unwrap();
    let by_rest = ds.partition_by(3, |x| (*x % 3) as usize).unwrap();
    // source partitions in order, then original position
    assert_eq!(
        by_rest.collect().await.unwrap(),
        vec![vec![0, 3, 6], vec![1, 4, 7], vec![2, 5, 8]]
    );
}

#[tokio::test]
async fn partition_by_out_of_range_fails_remotely() {
    let ds = ctx().parallelize_slices(vec![1_u32, 2], 1).unwrap();
    let bad = ds.partition_by(2, |x| *x as usize * 5).unwrap();
    match bad.count().await {
        Err(Error::Remote(e)) => assert!(e.to_string().contains("partition 5"), "{e}"),
        other => panic!("expected a remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_partitions_is_rejected_eagerly() {
    let ds = ctx().parallelize_slices(vec![(1, 1)], 1).unwrap();
    assert!(matches!(ds.partition_by(0, |_| 0), Err(Error::Config(_))));
    assert!(matches!(ds.repartition(0), Err(Error::Config(_))));
    assert!(matches!(ds.repartition_with_seed(0, 1), Err(Error::Config(_))));
    assert!(matches!(
        ds.reduce_by_key(0, |a: i32, b| a + b),
        Err(Error::Config(_))
    ));
    assert!(matches!(ds.group_by_key(0), Err(Error::Config(_))));
}

#[tokio::test]
async fn same_seed_same_assignment() {
    let items: Vec<String> = (0..200).map(|i| format!("item-{i}")).collect();
    let ds = ctx().parallelize_slices(items, 3).unwrap();

    let first = ds.repartition_with_seed(5, 0xdead_beef).unwrap();
    let again = ds.repartition_with_seed(5, 0xdead_beef).unwrap();
    let once = first.collect().await.unwrap();
    assert_eq!(once.len(), 5);
    assert_eq!(once, first.collect().await.unwrap());
    assert_eq!(once, again.collect().await.unwrap());
}

#[tokio::test]
async fn no_element_is_dropped_or_duplicated() {
    let mut items: Vec<i64> = (0..150).map(|i| i % 37).collect();
    let ds = ctx().parallelize_slices(items.clone(), 4).unwrap();
    items.sort();

    for seed in 0..16 {
        for n in [1, 2, 7] {
            let parts = ds.repartition_with_seed(n, seed).unwrap().collect().await.unwrap();
            assert_eq!(parts.len(), n);
            assert_eq!(sorted(parts), items, "seed={seed} n={n}");
        }
    }
}

#[tokio::test]
async fn equal_values_land_together() {
    let words: Vec<String> = ["x", "y", "x", "z", "y", "x"].map(String::from).into();
    let ds = ctx().parallelize_slices(words, 3).unwrap();
    let parts = ds.repartition_with_seed(4, 9).unwrap().collect().await.unwrap();
    for word in ["x", "y", "z"] {
        let holders = parts.iter().filter(|p| p.iter().any(|w| w == word)).count();
        assert_eq!(holders, 1, "{word} is split across partitions");
    }
}

#[tokio::test]
async fn drawn_seed_is_fixed_in_the_descriptor() {
    let ds = ctx().parallelize_slices(vec![1, 2, 3], 2).unwrap();
    let shuffled = ds.repartition(2).unwrap();

    let seed_of = |task: Task| match task {
        Task::Repartition(r) => {
            assert_eq!(r.num_partitions, 2);
            r.partition_func
                .env()
                .get::<HashPartitioner>("partitioner")
                .unwrap()
                .seed()
        }
        other => panic!("expected REPARTITION, got {}", other.kind()),
    };
    let seed = seed_of(shuffled.task().await.unwrap());
    assert_eq!(seed, seed_of(shuffled.task().await.unwrap()));
}

#[tokio::test]
async fn configured_seed_makes_repartition_reproducible() {
    let run = || async {
        let config = Config {
            seed: Some(1234),
            ..Config::default()
        };
        let ctx = Context::with_config(LocalTransport::new(2), config);
        ctx.parallelize_slices((0..40).collect::<Vec<u16>>(), 2)
            .unwrap()
            .repartition(3)
            .unwrap()
            .collect()
            .await
            .unwrap()
    };
    assert_eq!(run().await, run().await);
}

#[tokio::test]
async fn reduce_by_key_counts_words() {
    let text = "a rose is a rose is a rose";
    let pairs: Vec<(String, u32)> = text.split(' ').map(|w| (w.to_string(), 1)).collect();
    let ds = ctx().parallelize_slices(pairs, 3).unwrap();

    let counts = ds.reduce_by_key(2, |a, b| a + b).unwrap();
    let parts = counts.collect().await.unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(
        sorted(parts),
        vec![("a".to_string(), 3), ("is".to_string(), 2), ("rose".to_string(), 3)]
    );
}

#[tokio::test]
async fn group_by_key_keeps_every_value() {
    let pairs = vec![(1_u8, 'a'), (2, 'b'), (1, 'c'), (3, 'd'), (2, 'e'), (1, 'f')];
    let ds = ctx().parallelize_slices(pairs, 4).unwrap();

    let groups = ds.group_by_key(3).unwrap().collect().await.unwrap();
    let mut groups: Vec<(u8, Vec<char>)> = groups
        .into_iter()
        .flatten()
        .map(|(k, mut vs)| {
            vs.sort();
            (k, vs)
        })
        .collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![(1, vec!['a', 'c', 'f']), (2, vec!['b', 'e']), (3, vec!['d'])]
    );
}

#[tokio::test]
async fn keyed_shuffle_compiles_to_map_repartition_map() {
    let ds = ctx().parallelize_slices(vec![("k".to_string(), 1_i32)], 1).unwrap();
    let task = ds.reduce_by_key(2, |a, b| a.max(b)).unwrap().task().await.unwrap();
    let kinds: Vec<String> = task.chain().map(|t| t.kind().to_string()).collect();
    assert_eq!(kinds, vec!["MAP", "REPARTITION", "MAP", "CREATE"]);
}

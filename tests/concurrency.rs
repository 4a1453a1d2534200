//! Results must not depend on how many workers run them.

mod common;

use anyhow::Result;
use common::{TestEngine, parse_i64, worker_counts};
use minispark::testing::*;
use minispark::{Pipeline, Rdd};
use std::thread;
use std::time::Duration;

fn build(p: &Pipeline, a: &PartitionFiles, b: &PartitionFiles) -> Result<Rdd<i64>> {
    let left = a.source(p)?.filter_map(parse_i64).map(|n: &i64| n * 7);
    let right = b.source(p)?.filter_map(parse_i64).filter(|n: &i64| n % 3 == 0);
    let joined = left.join(&right, |x: &i64, y: &i64| ((x + y) % 4 != 0).then_some(x - y));
    joined.partition_by(|n: &i64, count| n.rem_euclid(count as i64) as usize, 3)
}

#[test]
fn same_output_for_every_worker_count() -> Result<()> {
    let a = numbered_partitions(5, 200)?;
    let b = numbered_partitions(5, 60)?;

    let mut runs = Vec::new();
    for workers in worker_counts() {
        let t = TestEngine::start(workers)?;
        let p = Pipeline::new();
        let out = build(&p, &a, &b)?;
        let count = out.count(&t.engine)?;
        let mut visited = Vec::new();
        out.for_each(&t.engine, |n| visited.push(*n))?;
        runs.push((workers, count, visited, out.collect_partitions(&t.engine)?));
        t.engine.stop()?;
    }

    let (_, count, visited, parts) = &runs[0];
    for (workers, c, v, ps) in &runs[1..] {
        assert_eq!(c, count, "count differs with {workers} workers");
        assert_collections_equal(v, visited);
        assert_partitions_equal(ps, parts);
    }
    Ok(())
}

#[test]
fn many_partitions_many_workers() -> Result<()> {
    let files = numbered_partitions(64, 6400)?;
    let t = TestEngine::start(8)?;
    let p = Pipeline::new();
    let squares = files
        .source(&p)?
        .filter_map(parse_i64)
        .map(|n: &i64| n * n)
        .filter(|n: &i64| n % 2 == 0);
    assert_matches_reference(&squares, &t.engine)?;
    assert_eq!(squares.count(&t.engine)?, 3200);
    Ok(())
}

#[test]
fn concurrent_actions_on_one_engine() -> Result<()> {
    let files = numbered_partitions(8, 800)?;
    let t = TestEngine::start(3)?;
    let p = Pipeline::new();
    let parsed = files.source(&p)?.filter_map(parse_i64);
    let branches: Vec<Rdd<i64>> = (1..=4)
        .map(|k| parsed.filter(move |n: &i64| n % k == 0))
        .collect();

    let engine = &t.engine;
    let counts = thread::scope(|s| {
        let handles: Vec<_> = branches
            .iter()
            .map(|rdd| s.spawn(move || rdd.count(engine)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("driver thread panicked"))
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(counts, vec![800, 400, 267, 200]);
    // the shared parse stage ran once per partition
    assert_eq!(t.engine.tasks_completed(), 8 + 4 * 8);
    Ok(())
}

#[test]
fn independent_engines_side_by_side() -> Result<()> {
    let files = write_partitions([vec![1, 2], vec![3, 4]])?;
    let first = TestEngine::start(1)?;
    let second = TestEngine::start(2)?;
    let p = Pipeline::new();
    let a = files.source(&p)?.filter_map(parse_i64).map(|n: &i64| n + 1);
    let b = a.filter(|n: &i64| n % 2 == 1);

    assert_eq!(a.count(&first.engine)?, 4);
    // `a` is already materialized; only the filter runs on the second engine
    assert_eq!(b.collect(&second.engine)?, vec![3, 5]);
    assert_eq!(second.engine.tasks_completed(), 2);
    Ok(())
}

#[test]
fn second_engine_waits_for_partitions_running_on_the_first() -> Result<()> {
    let files = write_partitions([vec![1, 2], vec![3, 4]])?;
    let first = TestEngine::start(2)?;
    let second = TestEngine::start(2)?;
    let p = Pipeline::new();
    let slow = files.source(&p)?.filter_map(parse_i64).map(|n: &i64| {
        thread::sleep(Duration::from_millis(100));
        n * 10
    });

    let (on_first, on_second) = thread::scope(|s| {
        let a = s.spawn(|| slow.count(&first.engine));
        thread::sleep(Duration::from_millis(30));
        let b = s.spawn(|| slow.collect(&second.engine));
        (
            a.join().expect("first driver panicked"),
            b.join().expect("second driver panicked"),
        )
    });

    assert_eq!(on_first?, 4);
    assert_eq!(on_second?, vec![10, 20, 30, 40]);
    // every partition of both derived nodes ran exactly once, on one engine or the other
    assert_eq!(
        first.engine.tasks_completed() + second.engine.tasks_completed(),
        4
    );
    Ok(())
}

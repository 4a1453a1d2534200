//! End-to-end evaluation of small graphs with known answers.

mod common;

use anyhow::Result;
use common::{TestEngine, parse_i64};
use minispark::Pipeline;
use minispark::testing::*;

#[test]
fn map_uppercase_over_two_files() -> Result<()> {
    let files = write_partitions([vec!["a"], vec!["b"]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let upper = files.source(&p)?.map(|l: &String| l.to_uppercase());

    assert_eq!(upper.count(&t.engine)?, 2);
    let mut seen = Vec::new();
    upper.for_each(&t.engine, |s| seen.push(s.clone()))?;
    assert_collections_equal(&seen, &["A".to_string(), "B".to_string()]);
    Ok(())
}

#[test]
fn filter_even() -> Result<()> {
    let files = write_partitions([vec![1, 2, 3], vec![4, 5, 6]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let even = files
        .source(&p)?
        .filter_map(parse_i64)
        .filter(|n: &i64| n % 2 == 0);

    assert_eq!(even.count(&t.engine)?, 3);
    assert_partitions_equal(&even.collect_partitions(&t.engine)?, &[vec![2], vec![4, 6]]);
    Ok(())
}

#[test]
fn filter_directly_on_lines() -> Result<()> {
    let files = write_partitions([vec!["keep", "drop"], vec!["drop", "keep", "keep"]])?;
    let t = TestEngine::start(1)?;
    let p = Pipeline::new();
    let kept = files.source(&p)?.filter(|l: &String| l == "keep");
    assert_eq!(kept.count(&t.engine)?, 3);
    Ok(())
}

#[test]
fn join_sums_matching_partitions() -> Result<()> {
    let left = write_partitions([vec![1, 2], vec![3, 4]])?;
    let right = write_partitions([vec![10, 20], vec![30, 40]])?;
    let t = TestEngine::start(3)?;
    let p = Pipeline::new();
    let a = left.source(&p)?.filter_map(parse_i64);
    let b = right.source(&p)?.filter_map(parse_i64);
    let sums = a.join(&b, |x: &i64, y: &i64| Some(x + y));

    assert_eq!(sums.count(&t.engine)?, 8);
    assert_partitions_equal(
        &sums.collect_partitions(&t.engine)?,
        &[vec![11, 21, 12, 22], vec![33, 43, 34, 44]],
    );
    // no cross-partition pair such as 1 + 30
    let all = sums.collect(&t.engine)?;
    assert_all(&all, |s| ![31, 41, 32, 42, 13, 23, 14, 24].contains(s));
    Ok(())
}

#[test]
fn join_can_drop_pairs() -> Result<()> {
    let left = write_partitions([vec![1, 2, 3]])?;
    let right = write_partitions([vec![2, 3, 4]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let a = left.source(&p)?.filter_map(parse_i64);
    let b = right.source(&p)?.filter_map(parse_i64);
    let equal = a.join(&b, |x: &i64, y: &i64| (x == y).then_some(*x));
    assert_eq!(equal.collect(&t.engine)?, vec![2, 3]);
    Ok(())
}

#[test]
fn partition_by_mod_three() -> Result<()> {
    let files = write_partitions([vec![1, 2, 3, 4, 5, 6]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let buckets = files
        .source(&p)?
        .filter_map(parse_i64)
        .partition_by(|n: &i64, count| (*n as usize) % count, 3)?;

    assert_eq!(buckets.num_partitions(), 3);
    assert_partitions_equal(
        &buckets.collect_partitions(&t.engine)?,
        &[vec![3, 6], vec![1, 4], vec![2, 5]],
    );
    Ok(())
}

#[test]
fn partition_by_leaves_untouched_buckets_empty() -> Result<()> {
    let files = write_partitions([vec![4, 8], vec![12]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let buckets = files
        .source(&p)?
        .filter_map(parse_i64)
        .partition_by(|n: &i64, count| (*n as usize) % count, 4)?;

    assert_partitions_equal(
        &buckets.collect_partitions(&t.engine)?,
        &[vec![4, 8, 12], vec![], vec![], vec![]],
    );
    assert_fully_materialized(&buckets);
    Ok(())
}

#[test]
fn chained_graph_matches_reference() -> Result<()> {
    let files = numbered_partitions(4, 400)?;
    let other = numbered_partitions(3, 30)?;
    let t = TestEngine::start(4)?;
    let p = Pipeline::new();
    let nums = files.source(&p)?.filter_map(parse_i64);
    let small = other.source(&p)?.filter_map(parse_i64);

    let tripled = nums.map(|n: &i64| n * 3).filter(|n: &i64| n % 2 == 1);
    let paired = tripled.join(&small, |a: &i64, b: &i64| (b % 5 == 0).then_some(a + b));
    let spread = paired.partition_by(|n: &i64, count| (*n as usize) % count, 5)?;

    assert_matches_reference(&spread, &t.engine)?;
    // partition 3 of `tripled` has no counterpart in `small`
    assert_eq!(paired.collect_partitions(&t.engine)?[3], Vec::<i64>::new());
    Ok(())
}

#[test]
fn string_items_survive_every_transform() -> Result<()> {
    let files = write_partitions([vec!["apple pie", "kiwi"], vec!["banana split"]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let words = files
        .source(&p)?
        .filter(|l: &String| l.contains(' '))
        .map(|l: &String| l.split(' ').map(str::to_string).collect::<Vec<_>>())
        .map(|w: &Vec<String>| w.len());
    assert_eq!(words.collect(&t.engine)?, vec![2, 2]);
    Ok(())
}

//! Failed tasks are reported, never hang the driver, and leave the engine usable.

mod common;

use anyhow::Result;
use common::{TestEngine, parse_i64};
use minispark::testing::*;
use minispark::{Pipeline, TaskError, TaskFailureKind, TransformKind};

#[test]
fn panicking_map_reports_node_and_partition() -> Result<()> {
    let files = write_partitions([vec![1], vec![2], vec![3]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let boom = files.source(&p)?.filter_map(parse_i64).map(|n: &i64| {
        assert!(*n != 2, "cannot handle two");
        *n
    });

    let err = boom.count(&t.engine).unwrap_err();
    let task = err
        .downcast_ref::<TaskError>()
        .expect("a task error");
    assert_eq!(task.node, boom.id());
    assert_eq!(task.kind, TransformKind::Map);
    assert_eq!(task.partition, 1);
    assert!(matches!(&task.cause, TaskFailureKind::Panicked(m) if m.contains("cannot handle two")));
    assert!(!boom.is_materialized());
    Ok(())
}

#[test]
fn failure_is_sticky_and_seen_downstream() -> Result<()> {
    let files = write_partitions([vec!["1", "x"]])?;
    let t = TestEngine::start(1)?;
    let p = Pipeline::new();
    let strict = files
        .source(&p)?
        .map(|l: &String| l.parse::<i64>().unwrap_or_else(|_| panic!("not a number: {l}")));
    let doubled = strict.map(|n: &i64| n * 2);

    let first = doubled.count(&t.engine).unwrap_err();
    assert!(format!("{first:#}").contains("not a number: x"));
    let tasks = t.engine.tasks_completed();

    let again = strict.count(&t.engine).unwrap_err();
    assert_eq!(first.to_string(), again.to_string());
    assert_eq!(t.engine.tasks_completed(), tasks);
    Ok(())
}

#[test]
fn bucket_out_of_range_fails_partition_by() -> Result<()> {
    let files = write_partitions([vec![1, 2, 3]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let bad = files
        .source(&p)?
        .filter_map(parse_i64)
        .partition_by(|n: &i64, _| *n as usize, 3)?;

    let err = bad.count(&t.engine).unwrap_err();
    let task = err.downcast_ref::<TaskError>().expect("a task error");
    assert_eq!(task.kind, TransformKind::PartitionBy);
    assert_eq!(
        task.cause,
        TaskFailureKind::BucketOutOfRange {
            bucket: 3,
            count: 3
        }
    );
    assert_eq!(bad.materialized_partitions(), vec![false; 3]);
    Ok(())
}

#[test]
fn engine_keeps_working_after_a_failure() -> Result<()> {
    let files = write_partitions([vec![1, 2], vec![3, 4]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let parsed = files.source(&p)?.filter_map(parse_i64);
    let broken = parsed.filter(|_: &i64| panic!("never"));
    let fine = parsed.map(|n: &i64| n * 10);

    assert!(broken.count(&t.engine).is_err());
    assert_eq!(fine.collect(&t.engine)?, vec![10, 20, 30, 40]);

    // 2 parse + 1 or 2 failed filters + 2 maps
    let ran = t.engine.tasks_completed();
    assert!((5..=6).contains(&ran));
    let summary = t.engine.stop()?;
    assert_eq!(summary.tasks_logged, ran);
    Ok(())
}

#[test]
fn construction_errors() -> Result<()> {
    let p = Pipeline::new();
    let none: [&str; 0] = [];
    assert!(minispark::source_from_files(&p, none).is_err());

    let missing = minispark::source_from_files(&p, ["/definitely/not/here.txt"]).unwrap_err();
    assert!(missing.to_string().contains("failed to open source file"));

    let files = write_partitions([vec!["a"]])?;
    let src = files.source(&p)?;
    assert!(src.partition_by(|_: &String, _| 0, 0).is_err());
    // failed constructions add no nodes
    assert_eq!(p.len(), 1);
    Ok(())
}

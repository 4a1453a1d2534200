//! The metrics log written by the consumer thread.

mod common;

use anyhow::Result;
use common::{TestEngine, parse_i64};
use mark_flaky_tests::flaky;
use minispark::testing::*;
use minispark::{EngineConfig, MetricsFormat, Pipeline, TransformKind};
use serde_json::Value;
use std::time::Duration;

#[test]
fn stop_without_tasks_leaves_empty_log() -> Result<()> {
    let t = TestEngine::start(4)?;
    let log = t.metrics_log();
    let summary = t.engine.stop()?;
    assert_eq!(summary.tasks_logged, 0);
    assert_eq!(std::fs::read_to_string(log)?, "");
    Ok(())
}

#[test]
fn one_line_per_task() -> Result<()> {
    let files = write_partitions([vec![1, 2, 3], vec![4, 5, 6]])?;
    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let spread = files
        .source(&p)?
        .filter_map(parse_i64)
        .filter(|n: &i64| *n > 1)
        .partition_by(|n: &i64, count| (*n as usize) % count, 4)?;
    spread.count(&t.engine)?;

    let log = t.metrics_log();
    let ran = t.engine.tasks_completed();
    let summary = t.engine.stop()?;
    assert_eq!(ran, 5);
    assert_eq!(summary.tasks_logged, ran);
    assert_eq!(summary.tasks_of(TransformKind::Map), 2);
    assert_eq!(summary.tasks_of(TransformKind::Filter), 2);
    assert_eq!(summary.tasks_of(TransformKind::PartitionBy), 1);

    let text = std::fs::read_to_string(log)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().all(|l| l.starts_with("RDD ") && l.contains(" -- creation ")));
    let repartition: Vec<_> = lines.iter().filter(|l| l.contains(" Trans 4 ")).collect();
    assert_eq!(repartition.len(), 1);
    assert!(repartition[0].starts_with(&format!("RDD {} Part 0 ", spread.id())));
    Ok(())
}

#[test]
fn json_lines_records() -> Result<()> {
    let files = write_partitions([vec!["a"], vec!["b"], vec!["c"]])?;
    let t = TestEngine::with_config(
        EngineConfig::default()
            .with_workers(2)
            .with_metrics_format(MetricsFormat::JsonLines),
    )?;
    let p = Pipeline::new();
    let upper = files.source(&p)?.map(|l: &String| l.to_uppercase());
    upper.count(&t.engine)?;
    let log = t.metrics_log();
    t.engine.stop()?;

    let mut partitions = Vec::new();
    for line in std::fs::read_to_string(log)?.lines() {
        let v: Value = serde_json::from_str(line)?;
        assert_eq!(v["kind"], "Map");
        assert_eq!(v["kind_code"], 1);
        assert_eq!(v["node"], upper.id().index());
        assert!(v["scheduled_us"].as_u64() >= v["created_us"].as_u64());
        partitions.push(v["partition"].as_u64().unwrap_or(u64::MAX));
    }
    partitions.sort_unstable();
    assert_eq!(partitions, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn fire_and_forget_accounts_for_every_task() -> Result<()> {
    let files = numbered_partitions(32, 320)?;
    let t = TestEngine::with_config(
        EngineConfig::default()
            .with_workers(4)
            .with_drain_on_shutdown(false),
    )?;
    let p = Pipeline::new();
    let parsed = files.source(&p)?.filter_map(parse_i64);
    parsed.count(&t.engine)?;
    let log = t.metrics_log();
    let summary = t.engine.stop()?;

    assert_eq!(summary.tasks_logged + summary.tasks_discarded, 32);
    let written = std::fs::read_to_string(log)?.lines().count() as u64;
    assert_eq!(written, summary.tasks_logged);
    Ok(())
}

#[flaky]
#[test]
fn execution_time_covers_the_transform() {
    let files = write_partitions([vec!["slow"]]).unwrap();
    let t = TestEngine::start(1).unwrap();
    let p = Pipeline::new();
    let slow = files.source(&p).unwrap().map(|l: &String| {
        std::thread::sleep(Duration::from_millis(20));
        l.len()
    });
    slow.count(&t.engine).unwrap();
    let summary = t.engine.stop().unwrap();
    assert!(summary.total_execution_us >= 20_000);
    assert!(summary.total_execution_us < 2_000_000);
}

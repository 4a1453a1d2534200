//! Sources built from glob patterns.
#![cfg(feature = "glob")]

mod common;

use anyhow::Result;
use common::TestEngine;
use minispark::testing::*;
use minispark::{Pipeline, expand_glob, source_from_glob};

#[test]
fn glob_orders_partitions_by_path() -> Result<()> {
    let files = write_partitions([vec!["first"], vec!["second"], vec!["third"]])?;
    std::fs::create_dir(files.dir().join("part-sub.txt"))?;
    let pattern = format!("{}/part-*.txt", files.dir().display());

    let matched = expand_glob(&pattern)?;
    assert_eq!(matched, files.paths());

    let t = TestEngine::start(2)?;
    let p = Pipeline::new();
    let src = source_from_glob(&p, &pattern)?;
    assert_eq!(src.num_partitions(), 3);
    assert_eq!(
        src.collect_partitions(&t.engine)?,
        vec![vec!["first"], vec!["second"], vec!["third"]]
    );
    Ok(())
}

#[test]
fn glob_without_matches_is_an_error() -> Result<()> {
    let files = write_partitions([vec!["x"]])?;
    let pattern = format!("{}/*.csv", files.dir().display());
    let p = Pipeline::new();
    let err = source_from_glob(&p, &pattern).unwrap_err();
    assert!(err.to_string().contains("no files match"));
    assert!(p.is_empty());
    Ok(())
}

#[test]
fn invalid_pattern_is_an_error() {
    assert!(expand_glob("[unclosed").is_err());
}

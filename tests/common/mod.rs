//! Shared helpers for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use minispark::{Engine, EngineConfig};
use std::path::PathBuf;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber once per test binary; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An engine whose metrics log lives in its own temporary directory.
pub struct TestEngine {
    pub engine: Engine,
    pub dir: TempDir,
}

impl TestEngine {
    pub fn start(workers: usize) -> Result<Self> {
        Self::with_config(EngineConfig::default().with_workers(workers))
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let engine = Engine::start(config.with_metrics_log(dir.path().join("metrics.log")))?;
        Ok(Self { engine, dir })
    }

    pub fn metrics_log(&self) -> PathBuf {
        self.dir.path().join("metrics.log")
    }
}

pub fn parse_i64(line: &String) -> Option<i64> {
    line.trim().parse().ok()
}

/// Worker counts every concurrency test runs with.
pub fn worker_counts() -> Vec<usize> {
    let mut counts = vec![1, 2, num_cpus_minus_one()];
    counts.sort_unstable();
    counts.dedup();
    counts
}

fn num_cpus_minus_one() -> usize {
    EngineConfig::default().worker_count()
}

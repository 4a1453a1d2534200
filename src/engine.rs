//! Engine lifecycle: the worker pool plus the metrics consumer.
//!
//! An [`Engine`] is an ordinary value. Start one, run actions against it, stop
//! it. Several engines may coexist; a dataset graph is not tied to any one of
//! them.

use crate::config::EngineConfig;
use crate::driver;
use crate::metrics::{MetricsPipeline, MetricsSummary};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::pool::{ThreadPool, WorkerStatus};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

pub struct Engine {
    pool: ThreadPool,
    metrics: Arc<MetricsPipeline>,
    config: EngineConfig,
}

impl Engine {
    /// Open the metrics log, start its consumer, then spawn the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics log cannot be opened or a thread cannot
    /// be spawned. Anything already started is shut down again.
    pub fn start(config: EngineConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsPipeline::start(&config.metrics)?);
        let workers = config.worker_count();
        let pool = ThreadPool::start(workers, Arc::clone(&metrics))?;
        info!(
            workers,
            metrics_log = %config.metrics.log_path.display(),
            "engine started"
        );
        Ok(Self {
            pool,
            metrics,
            config,
        })
    }

    /// Start with [`EngineConfig::default`].
    ///
    /// # Errors
    ///
    /// See [`Engine::start`].
    pub fn with_defaults() -> Result<Self> {
        Self::start(EngineConfig::default())
    }

    /// Wait for outstanding tasks, stop the workers, then drain and stop the
    /// metrics consumer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the metrics log failed.
    pub fn stop(mut self) -> Result<MetricsSummary> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<MetricsSummary> {
        self.pool.wait_idle();
        self.pool.shutdown();
        let summary = self.metrics.shutdown()?;
        info!(
            tasks = summary.tasks_logged,
            discarded = summary.tasks_discarded,
            "engine stopped"
        );
        Ok(summary)
    }

    /// Materialize `node` of `pipeline`, blocking until done.
    pub(crate) fn run(&self, pipeline: &Pipeline, node: NodeId) -> Result<()> {
        driver::run_to_completion(&self.pool, pipeline, node)
    }

    /// Tasks executed so far, failed ones included.
    #[must_use]
    pub fn tasks_completed(&self) -> u64 {
        self.pool.completed()
    }

    /// Metrics logged so far. The consumer may lag behind [`tasks_completed`](Self::tasks_completed).
    #[must_use]
    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    #[must_use]
    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.pool.statuses()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.pool.size() == 0 {
            return;
        }
        if let Err(e) = self.shutdown() {
            error!("engine shutdown failed: {e:#}");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workers", &self.pool.size())
            .field("tasks_completed", &self.tasks_completed())
            .finish_non_exhaustive()
    }
}

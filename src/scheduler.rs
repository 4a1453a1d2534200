//! Readiness walk over the dataset graph.
//!
//! [`Scheduler::iterate_rdd`] visits a node's dependencies first (post-order),
//! then queues every partition of the node whose inputs are materialized, then
//! re-checks whether the node itself is now complete. Partitions are scanned in
//! increasing index order; the first ready partition is the first queued.
//!
//! Readiness per transform:
//! - map / filter: the dependency's partition at the same index is materialized;
//! - join: both dependencies' partitions at that index are materialized (a left
//!   partition with no right counterpart only waits on the left);
//! - partition-by: the dependency is fully materialized. The whole node is one
//!   task, so every partition is marked scheduled at once.
//!
//! Only the driver runs a scheduler, and it does so while holding the queue
//! lock, so "check not scheduled, then mark scheduled" cannot race with another
//! submission for the same partition.

use crate::node::{DatasetNode, Transform};
use crate::pipeline::Pipeline;
use crate::pool::QueueGuard;
use crate::task::Task;
use anyhow::Result;
use std::sync::Arc;
use tracing::trace;

/// What one scheduling pass achieved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PassOutcome {
    pub(crate) submitted: usize,
    pub(crate) completed_nodes: usize,
    /// Partitions seen scheduled but not yet materialized, whichever pool runs them.
    pub(crate) in_flight: usize,
}

impl PassOutcome {
    pub(crate) fn made_progress(&self) -> bool {
        self.submitted > 0 || self.completed_nodes > 0
    }
}

pub(crate) struct Scheduler<'p, 'g, 'q> {
    pipeline: &'p Pipeline,
    queue: &'g mut QueueGuard<'q>,
    outcome: PassOutcome,
}

impl<'p, 'g, 'q> Scheduler<'p, 'g, 'q> {
    pub(crate) fn new(pipeline: &'p Pipeline, queue: &'g mut QueueGuard<'q>) -> Self {
        Self {
            pipeline,
            queue,
            outcome: PassOutcome::default(),
        }
    }

    /// One full pass from `target` down to the sources.
    pub(crate) fn run(mut self, target: &Arc<DatasetNode>) -> Result<PassOutcome> {
        self.iterate_rdd(target)?;
        Ok(self.outcome)
    }

    /// Queue ready work for `node` and everything it depends on.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure of the first failed node on the way.
    pub(crate) fn iterate_rdd(&mut self, node: &Arc<DatasetNode>) -> Result<()> {
        if node.is_fully_materialized() {
            return Ok(());
        }
        if let Some(err) = node.failure() {
            return Err(err.into());
        }
        for dep in node.transform().dependencies() {
            let dep = self.pipeline.node(dep)?;
            self.iterate_rdd(&dep)?;
        }
        self.queue_ready_partitions(node)?;
        if node.refresh_fully_materialized() {
            self.outcome.completed_nodes += 1;
        }
        Ok(())
    }

    /// Submit a task for every unscheduled partition of `node` whose inputs are ready.
    pub(crate) fn queue_ready_partitions(&mut self, node: &Arc<DatasetNode>) -> Result<()> {
        if node.is_fully_materialized() {
            return Ok(());
        }
        let pending: Vec<usize> = {
            let st = node.state();
            self.outcome.in_flight += (0..node.num_partitions())
                .filter(|&i| st.scheduled[i] && !st.materialized[i])
                .count();
            (0..node.num_partitions())
                .filter(|&i| !st.materialized[i] && !st.scheduled[i])
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        match node.transform() {
            Transform::Source(_) => {}
            Transform::Map { dep, .. } | Transform::Filter { dep, .. } => {
                let dep = self.pipeline.node(*dep)?;
                for i in pending {
                    if dep.is_partition_materialized(i) {
                        self.schedule(node, i);
                    } else {
                        trace!(node = %node.id(), partition = i, "waiting on dependency");
                    }
                }
            }
            Transform::Join { left, right, .. } => {
                let left = self.pipeline.node(*left)?;
                let right = self.pipeline.node(*right)?;
                for i in pending {
                    let right_ready =
                        i >= right.num_partitions() || right.is_partition_materialized(i);
                    if left.is_partition_materialized(i) && right_ready {
                        self.schedule(node, i);
                    }
                }
            }
            Transform::PartitionBy { dep, .. } => {
                let dep = self.pipeline.node(*dep)?;
                if dep.is_fully_materialized() {
                    node.state().scheduled.iter_mut().for_each(|s| *s = true);
                    self.submit(node, pending[0]);
                }
            }
        }
        Ok(())
    }

    fn schedule(&mut self, node: &Arc<DatasetNode>, partition: usize) {
        node.state().scheduled[partition] = true;
        self.submit(node, partition);
    }

    fn submit(&mut self, node: &Arc<DatasetNode>, partition: usize) {
        let mut task = Task::new(self.pipeline.clone(), Arc::clone(node), partition);
        // the queue lock is held, so no worker can see the task before this stamp
        task.metric.mark_scheduled();
        self.queue.submit(task);
        self.outcome.submitted += 1;
    }
}

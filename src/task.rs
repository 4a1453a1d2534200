//! Schedulable units of work and their timing records.

use crate::node::{DatasetNode, TransformKind};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::utils::{format_timestamp, since_epoch};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Timing record of one task.
///
/// Stamped when the task is created and when it is submitted; the duration is
/// filled in after execution, measured on a monotonic clock from submission.
#[derive(Debug, Clone)]
pub struct TaskMetric {
    pub node: NodeId,
    pub partition: usize,
    pub kind: TransformKind,
    pub created: SystemTime,
    pub scheduled: Option<SystemTime>,
    pub duration: Duration,
    scheduled_at: Option<Instant>,
}

impl TaskMetric {
    pub(crate) fn new(node: NodeId, partition: usize, kind: TransformKind) -> Self {
        Self {
            node,
            partition,
            kind,
            created: SystemTime::now(),
            scheduled: None,
            duration: Duration::ZERO,
            scheduled_at: None,
        }
    }

    pub(crate) fn mark_scheduled(&mut self) {
        self.scheduled = Some(SystemTime::now());
        self.scheduled_at = Some(Instant::now());
    }

    pub(crate) fn finish(&mut self) {
        if let Some(at) = self.scheduled_at {
            self.duration = at.elapsed();
        }
    }

    /// Execution time in whole microseconds.
    #[must_use]
    pub fn duration_micros(&self) -> u128 {
        self.duration.as_micros()
    }

    /// The fixed textual layout of one metrics log line (no trailing newline).
    #[must_use]
    pub fn to_log_line(&self) -> String {
        format!(
            "RDD {} Part {} Trans {} -- creation {}, scheduled {}, execution (usec) {}",
            self.node,
            self.partition,
            self.kind.code(),
            format_timestamp(self.created),
            format_timestamp(self.scheduled.unwrap_or(self.created)),
            self.duration_micros(),
        )
    }

    pub(crate) fn to_record(&self) -> MetricRecord {
        let micros = |t: SystemTime| saturating_u64(since_epoch(t).as_micros());
        MetricRecord {
            node: self.node.index(),
            partition: self.partition,
            kind: self.kind,
            kind_code: self.kind.code(),
            created_us: micros(self.created),
            scheduled_us: micros(self.scheduled.unwrap_or(self.created)),
            execution_us: saturating_u64(self.duration_micros()),
        }
    }
}

/// JSON shape of a [`TaskMetric`].
#[derive(Debug, Serialize)]
pub(crate) struct MetricRecord {
    node: usize,
    partition: usize,
    kind: TransformKind,
    kind_code: u8,
    created_us: u64,
    scheduled_us: u64,
    execution_us: u64,
}

fn saturating_u64(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// One (node, partition) unit of work. Consumed by exactly one worker.
pub(crate) struct Task {
    pub(crate) pipeline: Pipeline,
    pub(crate) node: Arc<DatasetNode>,
    pub(crate) partition: usize,
    pub(crate) metric: TaskMetric,
}

impl Task {
    pub(crate) fn new(pipeline: Pipeline, node: Arc<DatasetNode>, partition: usize) -> Self {
        let metric = TaskMetric::new(node.id(), partition, node.kind());
        Self {
            pipeline,
            node,
            partition,
            metric,
        }
    }
}

//! Error types for the engine.
//!
//! Most of the public API returns [`anyhow::Result`]. The two enums here exist
//! for conditions callers (and tests) need to tell apart: container misuse and
//! the failure of a single task.

use crate::node::TransformKind;
use crate::node_id::NodeId;
use thiserror::Error;

/// Failure of a [`PartitionList`](crate::partition::PartitionList) operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    /// A container must have at least one slot.
    #[error("invalid capacity {0}: capacity must be positive")]
    InvalidCapacity(usize),

    /// `grow` was asked for a capacity that is not larger than the current one.
    #[error("new capacity {requested} must be larger than current capacity {current}")]
    CapacityNotIncreased { current: usize, requested: usize },

    /// Index outside `0..capacity`.
    #[error("index {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    /// Slots are write-once; the target slot already holds a value.
    #[error("slot {0} already occupied")]
    SlotOccupied(usize),
}

/// Why a single task failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailureKind {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("partitioner returned bucket {bucket} for {count} output partitions")]
    BucketOutOfRange { bucket: usize, count: usize },

    #[error("item type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("dependency partition {0} is not available")]
    MissingInput(usize),

    #[error("node {0} is not part of this pipeline")]
    UnknownNode(NodeId),

    #[error("I/O error reading source: {0}")]
    Io(String),

    #[error("transform panicked: {0}")]
    Panicked(String),
}

/// A task that did not complete, with the node and partition it was working on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task for node {node} ({kind}) partition {partition} failed: {cause}")]
pub struct TaskError {
    pub node: NodeId,
    pub kind: TransformKind,
    pub partition: usize,
    pub cause: TaskFailureKind,
}

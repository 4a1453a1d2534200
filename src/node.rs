//! Dataset graph nodes.
//!
//! A [`DatasetNode`] is one stage of the graph: its transform, the ids of the
//! nodes it reads from, its outer [`PartitionList`], and per-partition
//! bookkeeping. The bookkeeping sits behind one mutex per node; that mutex is
//! the unit of mutual exclusion between the driver (which reads flags and marks
//! partitions scheduled) and the workers (which mark partitions materialized).
//!
//! Flags only ever move from `false` to `true`.

use crate::error::{ContainerError, TaskError, TaskFailureKind};
use crate::node_id::NodeId;
use crate::partition::PartitionList;
use crate::source::SourceFile;
use crate::utils::lock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

/// A type-erased element flowing through the engine.
///
/// Items are reference counted so a filter can pass an element through and a
/// partitioner can move it into a bucket without copying the value.
pub type Item = Arc<dyn Any + Send + Sync>;

/// The items of one partition.
pub(crate) type ItemList = Arc<PartitionList<Item>>;

pub(crate) type MapFn = Arc<dyn Fn(&Item) -> Result<Option<Item>, TaskFailureKind> + Send + Sync>;
pub(crate) type FilterFn = Arc<dyn Fn(&Item) -> Result<bool, TaskFailureKind> + Send + Sync>;
pub(crate) type JoinFn =
    Arc<dyn Fn(&Item, &Item) -> Result<Option<Item>, TaskFailureKind> + Send + Sync>;
pub(crate) type PartitionFn =
    Arc<dyn Fn(&Item, usize) -> Result<usize, TaskFailureKind> + Send + Sync>;

/// Which transformation a node applies. The discriminant is the code written to the metrics log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    Source = 0,
    Map = 1,
    Filter = 2,
    Join = 3,
    PartitionBy = 4,
}

impl TransformKind {
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Source => "source",
            TransformKind::Map => "map",
            TransformKind::Filter => "filter",
            TransformKind::Join => "join",
            TransformKind::PartitionBy => "partition_by",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The transform a node applies, together with its dependency edges.
pub(crate) enum Transform {
    /// Pre-materialized input, one partition per file.
    Source(Vec<SourceFile>),
    Map { dep: NodeId, f: MapFn },
    Filter { dep: NodeId, f: FilterFn },
    /// Partition-aligned: output `i` combines partition `i` of each side.
    Join { left: NodeId, right: NodeId, f: JoinFn },
    /// One task redistributes every input item across `count` buckets.
    PartitionBy {
        dep: NodeId,
        f: PartitionFn,
        count: NonZeroUsize,
    },
}

impl Transform {
    pub(crate) fn kind(&self) -> TransformKind {
        match self {
            Transform::Source(_) => TransformKind::Source,
            Transform::Map { .. } => TransformKind::Map,
            Transform::Filter { .. } => TransformKind::Filter,
            Transform::Join { .. } => TransformKind::Join,
            Transform::PartitionBy { .. } => TransformKind::PartitionBy,
        }
    }

    pub(crate) fn dependencies(&self) -> Vec<NodeId> {
        match self {
            Transform::Source(_) => Vec::new(),
            Transform::Map { dep, .. }
            | Transform::Filter { dep, .. }
            | Transform::PartitionBy { dep, .. } => vec![*dep],
            Transform::Join { left, right, .. } => vec![*left, *right],
        }
    }
}

/// Per-node bookkeeping guarded by the node mutex.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) materialized: Vec<bool>,
    pub(crate) scheduled: Vec<bool>,
    pub(crate) fully_materialized: bool,
    pub(crate) failure: Option<TaskError>,
}

impl NodeState {
    fn all_materialized(&self) -> bool {
        self.materialized.iter().all(|m| *m)
    }
}

pub(crate) struct DatasetNode {
    id: NodeId,
    transform: Transform,
    num_partitions: NonZeroUsize,
    /// Outer list: slot `i` holds partition `i` once installed. Unused by sources.
    partitions: PartitionList<ItemList>,
    state: Mutex<NodeState>,
}

impl DatasetNode {
    /// A source starts fully materialized: its partitions are the files themselves.
    pub(crate) fn source(id: NodeId, files: Vec<SourceFile>, num_partitions: NonZeroUsize) -> Self {
        let n = num_partitions.get();
        Self {
            id,
            transform: Transform::Source(files),
            num_partitions,
            partitions: PartitionList::new(num_partitions),
            state: Mutex::new(NodeState {
                materialized: vec![true; n],
                scheduled: vec![true; n],
                fully_materialized: true,
                failure: None,
            }),
        }
    }

    pub(crate) fn derived(id: NodeId, transform: Transform, num_partitions: NonZeroUsize) -> Self {
        let n = num_partitions.get();
        Self {
            id,
            transform,
            num_partitions,
            partitions: PartitionList::new(num_partitions),
            state: Mutex::new(NodeState {
                materialized: vec![false; n],
                scheduled: vec![false; n],
                fully_materialized: false,
                failure: None,
            }),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn transform(&self) -> &Transform {
        &self.transform
    }

    pub(crate) fn kind(&self) -> TransformKind {
        self.transform.kind()
    }

    pub(crate) fn num_partitions(&self) -> usize {
        self.num_partitions.get()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        lock(&self.state)
    }

    pub(crate) fn is_fully_materialized(&self) -> bool {
        self.state().fully_materialized
    }

    /// Materialized flag of partition `index`; `false` for an index the node does not have.
    pub(crate) fn is_partition_materialized(&self, index: usize) -> bool {
        self.state().materialized.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn materialized_flags(&self) -> Vec<bool> {
        self.state().materialized.clone()
    }

    pub(crate) fn failure(&self) -> Option<TaskError> {
        self.state().failure.clone()
    }

    /// Record the first failure seen for this node.
    pub(crate) fn record_failure(&self, err: TaskError) {
        let mut st = self.state();
        if st.failure.is_none() {
            st.failure = Some(err);
        }
    }

    /// Mark partition `index` materialized; sets the node flag once every partition is done.
    ///
    /// Returns `true` if this call completed the node.
    pub(crate) fn complete_partition(&self, index: usize) -> Result<bool, ContainerError> {
        let mut st = self.state();
        let capacity = st.materialized.len();
        let flag = st
            .materialized
            .get_mut(index)
            .ok_or(ContainerError::IndexOutOfRange { index, capacity })?;
        *flag = true;
        if !st.fully_materialized && st.all_materialized() {
            st.fully_materialized = true;
            return Ok(true);
        }
        Ok(false)
    }

    /// Mark every partition and the node materialized in one step.
    pub(crate) fn complete_all(&self) {
        let mut st = self.state();
        st.materialized.iter_mut().for_each(|m| *m = true);
        st.fully_materialized = true;
    }

    /// Set the node flag if all partitions are materialized. Returns `true` if it changed.
    pub(crate) fn refresh_fully_materialized(&self) -> bool {
        let mut st = self.state();
        if !st.fully_materialized && st.all_materialized() {
            st.fully_materialized = true;
            return true;
        }
        false
    }

    pub(crate) fn install(&self, index: usize, items: ItemList) -> Result<(), ContainerError> {
        self.partitions.set_at(index, items)
    }

    /// Installed items of partition `index`; `Ok(None)` until the partition is installed.
    pub(crate) fn partition(&self, index: usize) -> Result<Option<ItemList>, ContainerError> {
        self.partitions.get_at(index)
    }

    pub(crate) fn source_file(&self, index: usize) -> Option<&SourceFile> {
        match &self.transform {
            Transform::Source(files) => files.get(index),
            _ => None,
        }
    }
}

impl fmt::Debug for DatasetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetNode")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("num_partitions", &self.num_partitions)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

//! Execution of a single task against its node's dependencies.
//!
//! Dispatch is purely on the node's [`Transform`]. Map, filter and join build a
//! fresh item list for their one partition and install it at the same index of
//! the node's outer list; partition-by is the one transform whose single task
//! reads the whole dependency and fills every output bucket.
//!
//! A dependency is read one partition at a time, each read a single locked
//! access to that dependency's outer list. Source partitions are streamed line
//! by line straight from the file.

use crate::error::TaskFailureKind;
use crate::node::{DatasetNode, Item, ItemList, Transform};
use crate::node_id::NodeId;
use crate::partition::PartitionList;
use crate::pipeline::Pipeline;
use crate::task::Task;
use std::fs::File;
use std::io::{BufReader, Lines};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Starting slot count of a freshly built partition; appends double it as needed.
const INITIAL_PARTITION_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

type TaskResult<T> = Result<T, TaskFailureKind>;

/// Run `task` to completion and publish its output.
pub(crate) fn execute(task: &Task) -> TaskResult<()> {
    let node = task.node.as_ref();
    let index = task.partition;
    match node.transform() {
        // sources start materialized and are never scheduled
        Transform::Source(_) => Ok(()),
        Transform::Map { dep, f } => {
            let out = PartitionList::new(INITIAL_PARTITION_CAPACITY);
            read_input(&task.pipeline, *dep, index)?.for_each(|item| {
                if let Some(mapped) = f(&item)? {
                    out.append(mapped);
                }
                Ok(())
            })?;
            publish(node, index, out)
        }
        Transform::Filter { dep, f } => {
            let out = PartitionList::new(INITIAL_PARTITION_CAPACITY);
            read_input(&task.pipeline, *dep, index)?.for_each(|item| {
                if f(&item)? {
                    out.append(item);
                } else {
                    out.append_tombstone();
                }
                Ok(())
            })?;
            publish(node, index, out)
        }
        Transform::Join { left, right, f } => {
            let lhs = read_input(&task.pipeline, *left, index)?.into_items()?;
            let rhs = if lookup(&task.pipeline, *right)?.num_partitions() > index {
                read_input(&task.pipeline, *right, index)?.into_items()?
            } else {
                // no aligned right partition: joins against nothing
                Vec::new()
            };
            let out = PartitionList::new(INITIAL_PARTITION_CAPACITY);
            for l in &lhs {
                for r in &rhs {
                    if let Some(joined) = f(l, r)? {
                        out.append(joined);
                    }
                }
            }
            publish(node, index, out)
        }
        Transform::PartitionBy { dep, f, count } => {
            let count = count.get();
            let source = lookup(&task.pipeline, *dep)?;
            let mut buckets: Vec<Option<PartitionList<Item>>> = (0..count).map(|_| None).collect();
            for input in 0..source.num_partitions() {
                read_partition(&source, input)?.for_each(|item| {
                    let bucket = f(&item, count)?;
                    buckets
                        .get_mut(bucket)
                        .ok_or(TaskFailureKind::BucketOutOfRange { bucket, count })?
                        .get_or_insert_with(|| PartitionList::new(INITIAL_PARTITION_CAPACITY))
                        .append(item);
                    Ok(())
                })?;
            }
            for (i, bucket) in buckets.into_iter().enumerate() {
                let list = bucket.unwrap_or_else(|| PartitionList::new(INITIAL_PARTITION_CAPACITY));
                node.install(i, Arc::new(list))?;
            }
            node.complete_all();
            debug!(node = %node.id(), buckets = count, "node materialized");
            Ok(())
        }
    }
}

/// Install one finished partition and flip its materialized flag.
fn publish(node: &DatasetNode, index: usize, out: PartitionList<Item>) -> TaskResult<()> {
    let out: ItemList = Arc::new(out);
    node.install(index, out)?;
    if node.complete_partition(index)? {
        debug!(node = %node.id(), kind = %node.kind(), "node materialized");
    }
    Ok(())
}

fn lookup(pipeline: &Pipeline, id: NodeId) -> TaskResult<Arc<DatasetNode>> {
    pipeline
        .node(id)
        .map_err(|_| TaskFailureKind::UnknownNode(id))
}

fn read_input(pipeline: &Pipeline, dep: NodeId, index: usize) -> TaskResult<Input> {
    let node = lookup(pipeline, dep)?;
    read_partition(&node, index)
}

/// One partition of a dependency, ready to iterate.
pub(crate) fn read_partition(dep: &DatasetNode, index: usize) -> TaskResult<Input> {
    if let Some(file) = dep.source_file(index) {
        let lines = file
            .lines()
            .map_err(|e| TaskFailureKind::Io(format!("{}: {e}", file.path().display())))?;
        return Ok(Input::Lines(lines));
    }
    match dep.partition(index)? {
        Some(list) => Ok(Input::Items(list.items())),
        None => Err(TaskFailureKind::MissingInput(index)),
    }
}

/// The contents of one input partition, tombstones already skipped.
pub(crate) enum Input {
    Lines(Lines<BufReader<File>>),
    Items(Vec<Item>),
}

impl Input {
    pub(crate) fn for_each(self, mut f: impl FnMut(Item) -> TaskResult<()>) -> TaskResult<()> {
        match self {
            Input::Lines(lines) => {
                for line in lines {
                    let line = line.map_err(|e| TaskFailureKind::Io(e.to_string()))?;
                    f(Arc::new(line) as Item)?;
                }
            }
            Input::Items(items) => {
                for item in items {
                    f(item)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn into_items(self) -> TaskResult<Vec<Item>> {
        match self {
            Input::Items(items) => Ok(items),
            lines @ Input::Lines(_) => {
                let mut items = Vec::new();
                lines.for_each(|item| {
                    items.push(item);
                    Ok(())
                })?;
                Ok(items)
            }
        }
    }
}

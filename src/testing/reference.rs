//! Single-threaded reference evaluator.
//!
//! Replays every transform of a graph on the calling thread, in dependency
//! order, using the same user functions the engine runs. Nothing is stored on
//! the graph: evaluating never marks a node materialized, and an engine run
//! before or after sees the graph unchanged.

use crate::error::TaskFailureKind;
use crate::executor::read_partition;
use crate::node::{Item, Transform};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::rdd::{Data, Rdd};
use anyhow::{Context, Result};
use std::collections::HashMap;

type Partitions = Vec<Vec<Item>>;

/// Items of every partition of `rdd`, as a one-thread replay computes them.
///
/// # Errors
///
/// Returns the first error a transform reports (a bad partition index, a
/// type mismatch) or an I/O error reading a source file.
pub fn evaluate<T>(rdd: &Rdd<T>) -> Result<Vec<Vec<T>>>
where
    T: Data + Clone,
{
    let mut memo = HashMap::new();
    let parts = eval_node(rdd.pipeline(), rdd.id(), &mut memo)
        .with_context(|| format!("reference evaluation of node {} failed", rdd.id()))?;
    parts
        .iter()
        .map(|part| {
            part.iter()
                .map(|item| {
                    (**item)
                        .downcast_ref::<T>()
                        .cloned()
                        .ok_or(TaskFailureKind::TypeMismatch {
                            expected: std::any::type_name::<T>(),
                        })
                })
                .collect::<Result<Vec<T>, TaskFailureKind>>()
                .map_err(anyhow::Error::from)
        })
        .collect()
}

/// Total item count of a one-thread replay.
///
/// # Errors
///
/// See [`evaluate`].
pub fn count<T: Data>(rdd: &Rdd<T>) -> Result<usize> {
    let mut memo = HashMap::new();
    let parts = eval_node(rdd.pipeline(), rdd.id(), &mut memo)?;
    Ok(parts.iter().map(Vec::len).sum())
}

fn eval_node(
    pipeline: &Pipeline,
    id: NodeId,
    memo: &mut HashMap<NodeId, Partitions>,
) -> Result<Partitions> {
    if let Some(done) = memo.get(&id) {
        return Ok(done.clone());
    }
    let node = pipeline.node(id)?;
    let parts: Partitions = match node.transform() {
        Transform::Source(_) => (0..node.num_partitions())
            .map(|i| read_partition(&node, i)?.into_items())
            .collect::<Result<_, TaskFailureKind>>()?,
        Transform::Map { dep, f } => {
            let input = eval_node(pipeline, *dep, memo)?;
            let mut out = Vec::with_capacity(input.len());
            for part in &input {
                let mut items = Vec::new();
                for item in part {
                    items.extend(f(item)?);
                }
                out.push(items);
            }
            out
        }
        Transform::Filter { dep, f } => {
            let input = eval_node(pipeline, *dep, memo)?;
            let mut out = Vec::with_capacity(input.len());
            for part in input {
                let mut items = Vec::new();
                for item in part {
                    if f(&item)? {
                        items.push(item);
                    }
                }
                out.push(items);
            }
            out
        }
        Transform::Join { left, right, f } => {
            let lhs = eval_node(pipeline, *left, memo)?;
            let rhs = eval_node(pipeline, *right, memo)?;
            let mut out = Vec::with_capacity(lhs.len());
            for (i, lpart) in lhs.iter().enumerate() {
                let rpart = rhs.get(i).map(Vec::as_slice).unwrap_or_default();
                let mut items = Vec::new();
                for l in lpart {
                    for r in rpart {
                        items.extend(f(l, r)?);
                    }
                }
                out.push(items);
            }
            out
        }
        Transform::PartitionBy { dep, f, count } => {
            let count = count.get();
            let input = eval_node(pipeline, *dep, memo)?;
            let mut out: Partitions = vec![Vec::new(); count];
            for item in input.into_iter().flatten() {
                let bucket = f(&item, count)?;
                out.get_mut(bucket)
                    .ok_or(TaskFailureKind::BucketOutOfRange { bucket, count })?
                    .push(item);
            }
            out
        }
    };
    memo.insert(id, parts.clone());
    Ok(parts)
}

//! Typed handles onto dataset graph nodes.
//!
//! An [`Rdd<T>`] names one node of a [`Pipeline`] whose items are `T`.
//! Transformations only add nodes; nothing runs until an action
//! ([`count`](Rdd::count), [`for_each`](Rdd::for_each), [`collect`](Rdd::collect))
//! is called with an [`Engine`].
//!
//! ```no_run
//! use minispark::{Engine, Pipeline, source_from_files};
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::new();
//! let lines = source_from_files(&p, ["part-0.txt", "part-1.txt"])?;
//! let upper = lines.map(|l: &String| l.to_uppercase());
//!
//! let engine = Engine::with_defaults()?;
//! println!("{} lines", upper.count(&engine)?);
//! upper.for_each(&engine, |l| println!("{l}"))?;
//! engine.stop()?;
//! # Ok(())
//! # }
//! ```

use crate::engine::Engine;
use crate::error::TaskFailureKind;
use crate::executor::read_partition;
use crate::node::{DatasetNode, FilterFn, Item, JoinFn, MapFn, PartitionFn, Transform};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::source::SourceFile;
use anyhow::{Result, anyhow, bail};
use std::any::type_name;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Bound for anything that can flow through the graph.
pub trait Data: 'static + Send + Sync {}
impl<T> Data for T where T: 'static + Send + Sync {}

/// A lazily evaluated dataset of `T`, one node of a [`Pipeline`].
pub struct Rdd<T> {
    pipeline: Pipeline,
    id: NodeId,
    _t: PhantomData<fn() -> T>,
}

impl<T> Clone for Rdd<T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            id: self.id,
            _t: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Rdd<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rdd")
            .field("id", &self.id)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// A source dataset with one partition per file; items are the file's lines.
///
/// Every file is opened here, so a missing input fails construction rather
/// than a later action.
///
/// # Errors
///
/// Returns an error if `paths` is empty or any file cannot be opened.
pub fn source_from_files<I, P>(pipeline: &Pipeline, paths: I) -> Result<Rdd<String>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let files = paths
        .into_iter()
        .map(|p| SourceFile::open(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let Some(n) = NonZeroUsize::new(files.len()) else {
        bail!("a source needs at least one file");
    };
    let id = pipeline.insert_node(|id| DatasetNode::source(id, files, n));
    debug!(node = %id, partitions = n.get(), "source created");
    Ok(Rdd::attach(pipeline.clone(), id))
}

/// A source over every file matching `pattern`, in sorted path order.
///
/// # Errors
///
/// Returns an error for an invalid pattern, no matching files, or an
/// unreadable match.
#[cfg(feature = "glob")]
pub fn source_from_glob(pipeline: &Pipeline, pattern: &str) -> Result<Rdd<String>> {
    let paths = crate::source::expand_glob(pattern)?;
    if paths.is_empty() {
        bail!("no files match {pattern}");
    }
    source_from_files(pipeline, paths)
}

type TaskResult<T> = Result<T, TaskFailureKind>;

fn downcast<T: Data>(item: &Item) -> TaskResult<&T> {
    (**item).downcast_ref::<T>().ok_or(TaskFailureKind::TypeMismatch {
        expected: type_name::<T>(),
    })
}

fn wrap<T: Data>(value: T) -> Item {
    Arc::new(value)
}

impl<T: Data> Rdd<T> {
    fn attach(pipeline: Pipeline, id: NodeId) -> Self {
        Self {
            pipeline,
            id,
            _t: PhantomData,
        }
    }

    fn node(&self) -> Result<Arc<DatasetNode>> {
        self.pipeline.node(self.id)
    }

    fn derive<O: Data>(&self, transform: Transform, partitions: NonZeroUsize) -> Rdd<O> {
        let kind = transform.kind();
        let id = self
            .pipeline
            .insert_node(|id| DatasetNode::derived(id, transform, partitions));
        debug!(node = %id, %kind, partitions = partitions.get(), "node created");
        Rdd::attach(self.pipeline.clone(), id)
    }

    fn partitions(&self) -> NonZeroUsize {
        self.node()
            .ok()
            .and_then(|n| NonZeroUsize::new(n.num_partitions()))
            .unwrap_or(NonZeroUsize::MIN)
    }

    /// Apply `f` to every item; partition count is inherited.
    pub fn map<O, F>(&self, f: F) -> Rdd<O>
    where
        O: Data,
        F: Fn(&T) -> O + Send + Sync + 'static,
    {
        let f: MapFn = Arc::new(move |item: &Item| -> TaskResult<Option<Item>> {
            Ok(Some(wrap(f(downcast::<T>(item)?))))
        });
        self.derive(
            Transform::Map { dep: self.id, f },
            self.partitions(),
        )
    }

    /// Like [`map`](Self::map), dropping items for which `f` returns `None`.
    pub fn filter_map<O, F>(&self, f: F) -> Rdd<O>
    where
        O: Data,
        F: Fn(&T) -> Option<O> + Send + Sync + 'static,
    {
        let f: MapFn = Arc::new(move |item: &Item| -> TaskResult<Option<Item>> {
            Ok(f(downcast::<T>(item)?).map(wrap))
        });
        self.derive(
            Transform::Map { dep: self.id, f },
            self.partitions(),
        )
    }

    /// Keep the items matching `pred`. Kept items are shared, not copied.
    pub fn filter<F>(&self, pred: F) -> Rdd<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let f: FilterFn =
            Arc::new(move |item: &Item| -> TaskResult<bool> { Ok(pred(downcast::<T>(item)?)) });
        self.derive(
            Transform::Filter { dep: self.id, f },
            self.partitions(),
        )
    }

    /// Partition-aligned join: output partition `i` holds `f(l, r)` for every
    /// pair from partition `i` of `self` and partition `i` of `other` where `f`
    /// returns `Some`. Items in different partitions never meet.
    ///
    /// The result has `self`'s partition count. A partition of `self` with no
    /// counterpart in `other` produces an empty partition.
    ///
    /// # Panics
    ///
    /// Panics if `other` belongs to a different [`Pipeline`].
    pub fn join<U, O, F>(&self, other: &Rdd<U>, f: F) -> Rdd<O>
    where
        U: Data,
        O: Data,
        F: Fn(&T, &U) -> Option<O> + Send + Sync + 'static,
    {
        assert!(
            self.pipeline.same_graph(&other.pipeline),
            "cannot join datasets from different pipelines"
        );
        let f: JoinFn = Arc::new(move |l: &Item, r: &Item| -> TaskResult<Option<Item>> {
            Ok(f(downcast::<T>(l)?, downcast::<U>(r)?).map(wrap))
        });
        self.derive(
            Transform::Join {
                left: self.id,
                right: other.id,
                f,
            },
            self.partitions(),
        )
    }

    /// Redistribute every item into `count` partitions by `f(item, count)`.
    ///
    /// Runs as a single task once `self` is fully materialized. A bucket index
    /// outside `0..count` fails that task.
    ///
    /// # Errors
    ///
    /// Returns an error if `count` is zero.
    pub fn partition_by<F>(&self, f: F, count: usize) -> Result<Rdd<T>>
    where
        F: Fn(&T, usize) -> usize + Send + Sync + 'static,
    {
        let count = NonZeroUsize::new(count)
            .ok_or_else(|| anyhow!("partition_by needs at least one output partition"))?;
        let f: PartitionFn = Arc::new(move |item: &Item, n: usize| -> TaskResult<usize> {
            Ok(f(downcast::<T>(item)?, n))
        });
        Ok(self.derive(
            Transform::PartitionBy {
                dep: self.id,
                f,
                count,
            },
            count,
        ))
    }

    /// Materialize this dataset and everything it depends on.
    ///
    /// Already-materialized nodes are not run again.
    ///
    /// # Errors
    ///
    /// Returns the first task failure in the graph, or an error if evaluation
    /// cannot make progress.
    pub fn materialize(&self, engine: &Engine) -> Result<()> {
        engine.run(&self.pipeline, self.id)
    }

    /// Number of items across all partitions.
    ///
    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    pub fn count(&self, engine: &Engine) -> Result<usize> {
        self.materialize(engine)?;
        let node = self.node()?;
        let mut total = 0;
        for i in 0..node.num_partitions() {
            total += items_of(&node, i)?.len();
        }
        Ok(total)
    }

    /// Call `visit` on every item, partition 0 first, each partition in order.
    ///
    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    pub fn for_each(&self, engine: &Engine, mut visit: impl FnMut(&T)) -> Result<()> {
        self.materialize(engine)?;
        let node = self.node()?;
        for i in 0..node.num_partitions() {
            for item in items_of(&node, i)? {
                visit(downcast::<T>(&item)?);
            }
        }
        Ok(())
    }

    /// All items, in [`for_each`](Self::for_each) order.
    ///
    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    pub fn collect(&self, engine: &Engine) -> Result<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.collect_partitions(engine)?.into_iter().flatten().collect())
    }

    /// Items grouped by partition.
    ///
    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    pub fn collect_partitions(&self, engine: &Engine) -> Result<Vec<Vec<T>>>
    where
        T: Clone,
    {
        self.materialize(engine)?;
        let node = self.node()?;
        let mut partitions = Vec::with_capacity(node.num_partitions());
        for i in 0..node.num_partitions() {
            let items = items_of(&node, i)?;
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(downcast::<T>(item)?.clone());
            }
            partitions.push(out);
        }
        Ok(partitions)
    }

    /// Whether every partition is materialized. Sources always are.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.node().is_ok_and(|n| n.is_fully_materialized())
    }

    /// Per-partition materialized flags.
    #[must_use]
    pub fn materialized_partitions(&self) -> Vec<bool> {
        self.node()
            .map(|n| n.materialized_flags())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.partitions().get()
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

fn items_of(node: &DatasetNode, index: usize) -> Result<Vec<Item>> {
    Ok(read_partition(node, index)?.into_items()?)
}

//! # minispark
//!
//! An **in-process, multi-threaded dataflow engine** in the style of a tiny
//! Spark runtime. You describe a graph of dataset transformations rooted at
//! file-backed sources; nothing runs until an action forces evaluation, and
//! then work is scheduled partition by partition across a fixed thread pool.
//!
//! ## Key Features
//!
//! - **Lazy evaluation** - transformations only add graph nodes
//! - **Per-partition scheduling** - a downstream partition runs as soon as its
//!   own inputs are ready, not when the whole upstream dataset is
//! - **Partition-aligned joins** - partition `i` only ever meets partition `i`
//! - **Repartitioning** - `partition_by` redistributes a whole dataset in one task
//! - **Task metrics** - every task's creation, scheduling and execution time is
//!   written to a metrics log by a dedicated consumer thread
//!
//! ## Quick Start
//!
//! ```no_run
//! use minispark::{Engine, EngineConfig, Pipeline, source_from_files};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let p = Pipeline::new();
//! let numbers = source_from_files(&p, ["nums-0.txt", "nums-1.txt"])?
//!     .filter_map(|line: &String| line.trim().parse::<i64>().ok());
//! let even = numbers.filter(|n: &i64| n % 2 == 0);
//!
//! let engine = Engine::start(EngineConfig::default().with_workers(4))?;
//! println!("{} even numbers", even.count(&engine)?);
//! let summary = engine.stop()?;
//! summary.print();
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] owns the nodes of one dataset graph. Handles are cheap to
//! clone and share the same graph.
//!
//! ### Rdd
//!
//! An [`Rdd<T>`] is a typed handle onto one node. Its transformations:
//! - [`map`](Rdd::map) and [`filter_map`](Rdd::filter_map) - element-wise
//! - [`filter`](Rdd::filter) - keep matching elements
//! - [`join`](Rdd::join) - partition-aligned cross product with a combining function
//! - [`partition_by`](Rdd::partition_by) - redistribute into a new partition count
//!
//! and its actions: [`count`](Rdd::count), [`for_each`](Rdd::for_each),
//! [`collect`](Rdd::collect), [`collect_partitions`](Rdd::collect_partitions).
//! A node is executed at most once; later actions read the stored partitions.
//!
//! ### Engine
//!
//! An [`Engine`] is the worker pool plus the metrics consumer. Actions take an
//! engine by reference; [`Engine::stop`] drains outstanding work, joins every
//! thread, and returns a [`MetricsSummary`].
//!
//! ## Logging
//!
//! The engine reports through [`tracing`]. Install any subscriber to see it;
//! lifecycle events are `info`, node completion is `debug`, per-task
//! scheduling is `trace`, and task failures are `error`.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod node;
pub mod node_id;
pub mod partition;
pub mod pipeline;
pub mod pool;
pub mod rdd;
pub mod task;
pub mod testing;

mod driver;
mod executor;
mod scheduler;
mod source;
mod utils;

pub use config::{EngineConfig, MetricsConfig, MetricsFormat};
pub use engine::Engine;
pub use error::{ContainerError, TaskError, TaskFailureKind};
pub use metrics::MetricsSummary;
pub use node::{Item, TransformKind};
pub use node_id::NodeId;
pub use partition::PartitionList;
pub use pipeline::Pipeline;
pub use pool::WorkerStatus;
pub use rdd::{Data, Rdd, source_from_files};
pub use task::TaskMetric;

#[cfg(feature = "glob")]
pub use rdd::source_from_glob;
#[cfg(feature = "glob")]
pub use source::expand_glob;

//! Testing utilities for minispark dataset graphs.
//!
//! - **Reference evaluation**: [`reference::evaluate`] replays a graph on the
//!   calling thread, without an engine, so results can be checked against an
//!   independent execution
//! - **Fixtures**: [`write_partitions`] writes one temporary file per partition
//! - **Assertions**: compare collected items or partitions with expected ones
//!
//! # Quick Start
//!
//! ```no_run
//! use minispark::*;
//! use minispark::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let files = write_partitions([vec![1, 2, 3], vec![4, 5, 6]])?;
//! let p = Pipeline::new();
//! let even = files
//!     .source(&p)?
//!     .filter_map(|l: &String| l.parse::<i32>().ok())
//!     .filter(|n: &i32| n % 2 == 0);
//!
//! let engine = Engine::start(EngineConfig::default().with_workers(2))?;
//! assert_partitions_equal(&even.collect_partitions(&engine)?, &[vec![2], vec![4, 6]]);
//! assert_matches_reference(&even, &engine)?;
//! engine.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod reference;

pub use assertions::*;
pub use fixtures::*;

//! Arena handle for nodes within a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! Each dataset node added to a pipeline gets the
//! next sequential `NodeId`, which is also its index in the pipeline's arena.
//! Dependency edges are stored as `NodeId`s, so the graph holds no owning
//! references between nodes.

use std::fmt;

/// Unique numeric identifier for a node in a pipeline graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(v: usize) -> Self {
        Self(v)
    }

    /// Position of the node in its pipeline's arena.
    ///
    /// This is also the node identity written to the metrics log.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

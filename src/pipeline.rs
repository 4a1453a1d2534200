use crate::node::DatasetNode;
use crate::node_id::NodeId;
use crate::utils::lock;
use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex};

/// -------- Pipeline arena --------
/// Owns every node of one dataset graph. Nodes reference each other by
/// [`NodeId`], which indexes into `nodes`. The arena lock is only held long
/// enough to push a node or clone an `Arc` out of it; all per-node state has
/// its own lock.
pub struct Pipeline {
    pub(crate) inner: Arc<PipelineInner>,
}

pub(crate) struct PipelineInner {
    nodes: Mutex<Vec<Arc<DatasetNode>>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                nodes: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Allow `Pipeline` cloning; clones share one arena.
impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Pipeline {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node built from its freshly assigned id.
    pub(crate) fn insert_node(&self, build: impl FnOnce(NodeId) -> DatasetNode) -> NodeId {
        let mut nodes = lock(&self.inner.nodes);
        let id = NodeId::new(nodes.len());
        nodes.push(Arc::new(build(id)));
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<Arc<DatasetNode>> {
        lock(&self.inner.nodes)
            .get(id.index())
            .cloned()
            .ok_or_else(|| anyhow!("node {id} not found"))
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner.nodes).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `self` and `other` share one arena.
    pub(crate) fn same_graph(&self, other: &Pipeline) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

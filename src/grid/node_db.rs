use super::{h_refinement::MeshAccessError, node::Node, space::Point};
use std::collections::BTreeMap;

/// Registry of every [Node] in a [Grid](super::Grid)
///
/// Nodes are keyed by their quantized location, so asking for the same location twice (from an initial cell,
/// a sibling, or a neighbor's children) always yields the same Node. Node IDs are indices into [`Self::all_nodes`]
/// and never change once assigned.
#[derive(Debug, Clone)]
pub struct NodeDataBase {
    dim: usize,
    all_nodes: Vec<Node>,
    lookup: BTreeMap<Point, usize>,
}

impl NodeDataBase {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            all_nodes: Vec::new(),
            lookup: BTreeMap::new(),
        }
    }

    /// Get the ID of the Node at `point`, creating it if there isn't one yet
    pub fn get_or_create(&mut self, point: Point) -> Result<usize, MeshAccessError> {
        if point.dim() != self.dim {
            return Err(MeshAccessError::DimensionMismatch {
                expected: self.dim,
                found: point.dim(),
            });
        }

        if let Some(node_id) = self.lookup.get(&point) {
            return Ok(*node_id);
        }

        let node_id = self.all_nodes.len();
        tracing::trace!(node_id, coords = %point, "new node");

        self.lookup.insert(point.clone(), node_id);
        self.all_nodes.push(Node::new(node_id, point));

        Ok(node_id)
    }

    /// ID of the Node at `point` (if it exists)
    pub fn get(&self, point: &Point) -> Option<usize> {
        self.lookup.get(point).copied()
    }

    pub fn node(&self, node_id: usize) -> Result<&Node, MeshAccessError> {
        self.all_nodes
            .get(node_id)
            .ok_or(MeshAccessError::NodeDoesNotExist(node_id))
    }

    /// All Nodes in creation order
    pub fn all_nodes(&self) -> &[Node] {
        &self.all_nodes
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.all_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_nodes.is_empty()
    }

    pub(crate) fn connect_cell(&mut self, node_id: usize, cell_id: usize) {
        self.all_nodes[node_id].connect_cell(cell_id);
    }
}

use super::{h_refinement::Orthant, EXPECTED_NUM_H_REFINEMENTS};

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use smallvec::SmallVec;

/// `GridCell`s are the axis-aligned hypercubes that make up a [Grid](super::Grid)
///
/// `GridCell`s are responsible for keeping track of:
/// * Their `2^D` vertex `Node`s (in the local corner order described by [HypercubeTopology](super::topology::HypercubeTopology))
/// * Connections to their parent `GridCell` (and their own h-refinement state)
/// * Connections to their child `GridCell`s (if h-refined)
///
/// ## h-Refinement
///
/// A `GridCell` is h-refined by bisecting it along every axis at once, producing `2^D` children.
/// The relative indices of child cells and their corner Nodes are shown below for D = 2:
///
/// ```text
///      1 ----------- + ----------- 3
///      |1           3|1           3|
///      |             |             |
///      |      1      |      3      |
///      |             |             |
///      |0           2|0           2|
///      + ----------- * ----------- +
///      |1           3|1           3|
///      |             |             |
///      |      0      |      2      |
///      |             |             |
///      |0           2|0           2|
///      0 ----------- + ----------- 2
/// ```
///
/// Corner numbers on the outer border belong to the parent. The center node (`*`) and the edge midpoints (`+`) are
/// shared by all children that touch them, as well as by any neighboring cell's children.
#[derive(Debug, Clone)]
pub struct GridCell {
    pub id: usize,
    pub vertex_nodes: SmallVec<[usize; 8]>,
    level: u8,
    children: Option<SmallVec<[usize; 8]>>,
    ancestors: SmallVec<[(usize, Orthant); EXPECTED_NUM_H_REFINEMENTS]>,
}

impl GridCell {
    /// Construct a new root (level 0) GridCell from its vertex Node IDs
    pub fn new(id: usize, vertex_nodes: SmallVec<[usize; 8]>) -> Self {
        Self {
            id,
            vertex_nodes,
            level: 0,
            children: None,
            ancestors: SmallVec::new(),
        }
    }

    /// Construct a child of `parent` which sits in `orthant`
    pub(crate) fn new_child(
        id: usize,
        vertex_nodes: SmallVec<[usize; 8]>,
        parent: &GridCell,
        orthant: Orthant,
    ) -> Self {
        let mut ancestors = parent.ancestors.clone();
        ancestors.push((parent.id, orthant));

        Self {
            id,
            vertex_nodes,
            level: parent.level + 1,
            children: None,
            ancestors,
        }
    }

    pub(crate) fn set_children(&mut self, child_ids: SmallVec<[usize; 8]>) {
        assert!(
            self.children.is_none(),
            "GridCell {} already has children {:?}; Cannot set children to {:?}!",
            self.id,
            self.children,
            child_ids
        );
        self.children = Some(child_ids);
    }

    /// ID of the Parent GridCell if this GridCell has a parent
    pub fn parent_id(&self) -> Option<usize> {
        self.ancestors.last().map(|(id, _)| *id)
    }

    /// Returns the IDs of this GridCell's children. Returns `None` if this GridCell has not been h-refined.
    pub fn child_ids(&self) -> Option<&[usize]> {
        self.children.as_deref()
    }

    /// Has this `GridCell` been h-Refined
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// Number of h-refinements between this cell and its root ancestor
    pub fn level(&self) -> u8 {
        self.level
    }

    /// The location of this GridCell relative to its parent (`None` for initial cells)
    pub fn orthant(&self) -> Option<Orthant> {
        self.ancestors.last().map(|(_, orthant)| *orthant)
    }

    /// Get the stack of [Orthant]s and GridCell-IDs back to this `GridCell`s ancestor on the base layer of the grid
    pub fn loc_stack(&self) -> &[(usize, Orthant)] {
        &self.ancestors
    }

    /// Produce a Json Object that describes this GridCell
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "parent": self.parent_id(),
            "level": self.level,
            "active": self.children.is_none(),
            "nodes": self.vertex_nodes.to_vec(),
            "children": JsonValue::from(
                match &self.children {
                    Some(ids) => ids.to_vec(),
                    None => Vec::new(),
                }
            )
        }
    }
}

use super::{space::COORD_UNIQUENESS_ACCURACY, MIN_CELL_WIDTH};
use std::fmt;
use thiserror::Error;

/// Location of a child [GridCell](super::cell::GridCell) relative to its parent following an h-Refinement
///
/// The index uses the same binary code as the local corner ordering. Bit `D-1-i` is set when the child sits in the
/// upper half of the parent along axis `i`, so in 2D:
///
/// ```text
///     axis 1
///       ^
///       |-----------|-----------|
///       |           |           |
///       |     1     |     3     |
///       |           |           |
///       |-----------|-----------|
///       |           |           |
///       |     0     |     2     |
///       |           |           |
///       |-----------|-----------|  --> axis 0
/// ```
///
/// `Orthant(0)` is always the cell touching the parent's low corner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Orthant(pub(crate) usize);

impl Orthant {
    pub fn index(&self) -> usize {
        self.0
    }

    /// Does this Orthant lie in the upper half of its parent along `axis`
    pub fn is_upper(&self, axis: usize, dim: usize) -> bool {
        assert!(axis < dim);
        (self.0 >> (dim - 1 - axis)) & 1 == 1
    }

    /// Range of an orthant within `[low, high]` along a single axis
    pub fn sub_range(&self, axis: usize, dim: usize, [low, high]: [f64; 2]) -> [f64; 2] {
        let mid = (low + high) / 2.0;
        if self.is_upper(axis, dim) {
            [mid, high]
        } else {
            [low, mid]
        }
    }
}

impl fmt::Display for Orthant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Orthant({})", self.0)
    }
}

/// The Error Type for invalid h-Refinements
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HRefError {
    #[error("GridCell {0} does not exist; Cannot apply h-Refinement!")]
    CellDoesNotExist(usize),
    #[error("GridCell {0} has already been h-Refined; Cannot apply h-Refinement!")]
    CellHasChildren(usize),
    #[error("GridCell {0} was listed for h-Refinement more than once; Cannot apply h-Refinements!")]
    DoubleRefinement(usize),
    #[error(
        "Children of GridCell {0} would be narrower than the minimum width ({min}); Cannot apply h-Refinement!",
        min = MIN_CELL_WIDTH
    )]
    MinCellWidth(usize),
    #[error(
        "GridCell {0} has zero or negative width along some axis (accuracy: {acc}); Cannot apply h-Refinement!",
        acc = COORD_UNIQUENESS_ACCURACY
    )]
    DegenerateCell(usize),
    #[error(transparent)]
    MeshAccess(#[from] MeshAccessError),
}

/// The Error Type for retrieving Nodes and GridCells from a [Grid](super::Grid)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshAccessError {
    #[error("GridCell {0} does not exist; Cannot access GridCell!")]
    CellDoesNotExist(usize),
    #[error("Node {0} does not exist; Cannot access Node!")]
    NodeDoesNotExist(usize),
    #[error("GridCells in {dim} dimensions need {expected} vertex Nodes (got {found}); Cannot create GridCell!")]
    WrongNumberOfVertices {
        dim: usize,
        expected: usize,
        found: usize,
    },
    #[error("Vertex {corner} does not sit on the corner of a non-degenerate axis-aligned box; Cannot create GridCell!")]
    MalformedCell { corner: usize },
    #[error("Point has {found} coordinates but the Grid is {expected}-dimensional; Cannot create Node!")]
    DimensionMismatch { expected: usize, found: usize },
}

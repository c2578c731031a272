use smallvec::SmallVec;

/// Corner and Edge combinatorics of a D-dimensional hypercube
///
/// ## Layout
/// Corners are indexed by a D-bit binary code. Axis 0 is the most significant bit. A `0` bit selects the low
/// coordinate along that axis and a `1` selects the high coordinate. For D = 2:
///
/// ```text
///    axis 1
///      ^
///      1 --------- 3
///      |           |
///      |           |
///      |           |
///      0 --------- 2  --> axis 0
/// ```
///
/// Edges join pairs of corners whose codes differ in exactly one bit: `[0, 1], [0, 2], [1, 3], [2, 3]` above.
///
/// The same code also indexes child cells after subdivision, so child `c` is the orthant that is "high" along
/// every axis where bit `c` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HypercubeTopology {
    dim: usize,
    edge_pairs: Vec<[usize; 2]>,
}

impl HypercubeTopology {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "Hypercube must have at least one dimension!");

        let num_corners: usize = 1 << dim;
        let edge_pairs = (0..num_corners)
            .flat_map(|i| ((i + 1)..num_corners).map(move |j| [i, j]))
            .filter(|&[i, j]| (i ^ j).count_ones() == 1)
            .collect();

        Self { dim, edge_pairs }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// 2^D
    pub fn num_corners(&self) -> usize {
        1 << self.dim
    }

    /// D * 2^(D-1)
    pub fn num_edges(&self) -> usize {
        self.edge_pairs.len()
    }

    /// Pairs of local corner indices which are connected by an edge (sorted, with `i < j` in each pair)
    pub fn edge_pairs(&self) -> &[[usize; 2]] {
        &self.edge_pairs
    }

    /// Is `corner` on the high side of the hypercube along `axis`? (0 or 1)
    #[inline]
    pub fn corner_bit(&self, corner: usize, axis: usize) -> usize {
        debug_assert!(axis < self.dim && corner < self.num_corners());
        (corner >> (self.dim - 1 - axis)) & 1
    }

    /// Low/high offsets of a corner along each axis
    pub fn corner_offsets(&self, corner: usize) -> SmallVec<[usize; 3]> {
        (0..self.dim)
            .map(|axis| self.corner_bit(corner, axis))
            .collect()
    }

    /// Build a corner index from its low/high offsets along each axis
    pub fn corner_from_offsets(&self, offsets: &[usize]) -> usize {
        assert_eq!(offsets.len(), self.dim);
        offsets
            .iter()
            .fold(0, |code, offset| (code << 1) | (offset & 1))
    }

    /// The position of a child's corner on the bisected parent, along each axis
    ///
    /// Each entry is 0 (parent low), 1 (parent midpoint) or 2 (parent high).
    pub fn child_corner_levels(&self, orthant: usize, corner: usize) -> SmallVec<[usize; 3]> {
        (0..self.dim)
            .map(|axis| self.corner_bit(orthant, axis) + self.corner_bit(corner, axis))
            .collect()
    }
}

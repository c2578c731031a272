pub mod cell;
pub mod h_refinement;
pub mod node;
pub mod node_db;
pub mod space;
pub mod topology;

use crate::meshgrid::{GridError, MeshGrid};
use cell::GridCell;
use h_refinement::{HRefError, MeshAccessError, Orthant};
use node_db::NodeDataBase;
use space::Point;
use topology::HypercubeTopology;

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeSet;
#[cfg(feature = "json_export")]
use std::{fs::File, io::BufWriter, path::Path};

/// Cells cannot be h-refined if their children would be narrower than this along any axis
pub const MIN_CELL_WIDTH: f64 = 1e-9;

/// Refinement depth that ancestor stacks hold without allocating
pub const EXPECTED_NUM_H_REFINEMENTS: usize = 8;

pub use crate::meshgrid::MAX_GRID_DIMENSION;

/// Child vertex locations for each orthant of a cell that is about to be h-refined
type ChildPoints = Vec<Vec<Point>>;

/// An adaptively refinable grid of axis-aligned hypercubes in D dimensions
///
/// The Grid owns every [Node](node::Node) (through its [NodeDataBase]) and every [GridCell] ever created.
/// Cells are never removed: h-refinement appends `2^D` children to the end of [`Self::cells`] and links them
/// to their parent by ID.
#[derive(Debug, Clone)]
pub struct Grid {
    dim: usize,
    ndb: NodeDataBase,
    cells: Vec<GridCell>,
    num_initial_cells: usize,
    topology: HypercubeTopology,
    mesh: MeshGrid,
}

impl Grid {
    /// Construct a Grid with one initial [GridCell] per block of adjacent points in `mesh`
    ///
    /// Initial cells are numbered in row-major order over the mesh's blocks.
    pub fn new(mesh: MeshGrid) -> Self {
        let dim = mesh.dim();
        let topology = HypercubeTopology::new(dim);

        let mut ndb = NodeDataBase::new(dim);
        let mesh_node_ids = create_nodes_from_mg(&mut ndb, &mesh)
            .expect("NodeDataBase was created with the mesh's dimension");

        let cell_shape: Vec<usize> = mesh.shape().iter().map(|n| n - 1).collect();
        let mut cells = Vec::with_capacity(mesh.num_cells());
        let mut corner_index: SmallVec<[usize; 3]> = SmallVec::from_elem(0, dim);

        for block in ndarray::indices(IxDyn(&cell_shape)) {
            let cell_id = cells.len();
            let vertex_nodes: SmallVec<[usize; 8]> = (0..topology.num_corners())
                .map(|corner| {
                    for axis in 0..dim {
                        corner_index[axis] = block[axis] + topology.corner_bit(corner, axis);
                    }
                    mesh_node_ids[mesh.flat_index(&corner_index)]
                })
                .collect();

            for node_id in vertex_nodes.iter() {
                ndb.connect_cell(*node_id, cell_id);
            }
            cells.push(GridCell::new(cell_id, vertex_nodes));
        }

        tracing::info!(
            dim,
            shape = ?mesh.shape(),
            nodes = ndb.len(),
            cells = cells.len(),
            "constructed grid"
        );

        Self {
            dim,
            ndb,
            num_initial_cells: cells.len(),
            cells,
            topology,
            mesh,
        }
    }

    /// Validate a set of "ij" indexed coordinate arrays and construct a Grid from them
    pub fn from_arrays(arrays: Vec<ArrayD<f64>>) -> Result<Self, GridError> {
        Ok(Self::new(MeshGrid::new(arrays)?))
    }

    /// Register a free-standing level-0 [GridCell] built from existing Nodes
    ///
    /// `vertex_nodes` must hold `2^D` Node IDs in local corner order (see [HypercubeTopology]) which sit on the
    /// corners of an axis-aligned box with a positive width along every axis.
    pub fn insert_cell(&mut self, vertex_nodes: &[usize]) -> Result<usize, MeshAccessError> {
        let expected = self.topology.num_corners();
        if vertex_nodes.len() != expected {
            return Err(MeshAccessError::WrongNumberOfVertices {
                dim: self.dim,
                expected,
                found: vertex_nodes.len(),
            });
        }
        let points = vertex_nodes
            .iter()
            .map(|node_id| Ok(&self.ndb.node(*node_id)?.coords))
            .collect::<Result<Vec<&Point>, MeshAccessError>>()?;
        self.check_box_corners(&points)?;

        let cell_id = self.cells.len();
        for node_id in vertex_nodes {
            self.ndb.connect_cell(*node_id, cell_id);
        }
        self.cells
            .push(GridCell::new(cell_id, SmallVec::from_slice(vertex_nodes)));

        Ok(cell_id)
    }

    // ----------------------------------------------------------------------------------------------------
    // General Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn ndb(&self) -> &NodeDataBase {
        &self.ndb
    }

    pub fn topology(&self) -> &HypercubeTopology {
        &self.topology
    }

    /// Pairs of local vertex indices joined by an edge of every cell
    pub fn idx_edge_pairs(&self) -> &[[usize; 2]] {
        self.topology.edge_pairs()
    }

    /// Every GridCell in the Grid (including those that have been h-refined)
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_initial_cells(&self) -> usize {
        self.num_initial_cells
    }

    pub fn cell(&self, cell_id: usize) -> Result<&GridCell, MeshAccessError> {
        self.cells
            .get(cell_id)
            .ok_or(MeshAccessError::CellDoesNotExist(cell_id))
    }

    /// The mesh this Grid was constructed from
    pub fn mesh(&self) -> &MeshGrid {
        &self.mesh
    }

    /// The input mesh coordinates, flattened along each axis
    pub fn all_mg_points(&self) -> &[Vec<f64>] {
        self.mesh.axis_points()
    }

    pub fn mg_shape(&self) -> &[usize] {
        self.mesh.shape()
    }

    /// Get the [Point]s of a cell's vertices in local corner order
    pub fn vertex_coords(&self, cell_id: usize) -> Result<Vec<&Point>, MeshAccessError> {
        Ok(self
            .cell(cell_id)?
            .vertex_nodes
            .iter()
            .map(|node_id| self.node_point(*node_id))
            .collect())
    }

    /// Get the end-[Point]s of each of a cell's edges (ordered by [`Self::idx_edge_pairs`])
    pub fn edge_coords(&self, cell_id: usize) -> Result<Vec<[&Point; 2]>, MeshAccessError> {
        let vertices = self.vertex_coords(cell_id)?;
        Ok(self
            .topology
            .edge_pairs()
            .iter()
            .map(|&[i, j]| [vertices[i], vertices[j]])
            .collect())
    }

    /// Get the lowest and highest corners of a cell
    pub fn cell_bounds(&self, cell_id: usize) -> Result<[&Point; 2], MeshAccessError> {
        Ok(self.bounds_of(self.cell(cell_id)?))
    }

    pub fn cell_center(&self, cell_id: usize) -> Result<Point, MeshAccessError> {
        let [low, high] = self.cell_bounds(cell_id)?;
        Ok(Point::between(low, high))
    }

    /// Vertex coordinates of every cell in the Grid
    pub fn all_cell_vertex_coords(&self) -> Vec<Vec<&Point>> {
        self.cells
            .iter()
            .map(|cell| {
                cell.vertex_nodes
                    .iter()
                    .map(|node_id| self.node_point(*node_id))
                    .collect()
            })
            .collect()
    }

    /// Every distinct edge of the leaf cells as a pair of end-points
    ///
    /// Edges shared by neighboring leaves are only listed once.
    pub fn leaf_edge_segments(&self) -> Vec<[&Point; 2]> {
        let mut node_pairs: Vec<[usize; 2]> = self
            .cells
            .par_iter()
            .filter(|cell| !cell.has_children())
            .flat_map_iter(|cell| {
                self.topology.edge_pairs().iter().map(move |&[i, j]| {
                    let (a, b) = (cell.vertex_nodes[i], cell.vertex_nodes[j]);
                    [a.min(b), a.max(b)]
                })
            })
            .collect();

        node_pairs.par_sort_unstable();
        node_pairs.dedup();

        node_pairs
            .into_iter()
            .map(|[a, b]| [self.node_point(a), self.node_point(b)])
            .collect()
    }

    /// IDs of the cells which have `node_id` as a vertex
    pub fn cells_at_node(&self, node_id: usize) -> Result<&[usize], MeshAccessError> {
        Ok(self.ndb.node(node_id)?.cell_ids())
    }

    /// IDs of the Nodes shared by two cells (in the local corner order of `cell_a`)
    pub fn shared_nodes(&self, cell_a: usize, cell_b: usize) -> Result<Vec<usize>, MeshAccessError> {
        let b_nodes = &self.cell(cell_b)?.vertex_nodes;
        Ok(self
            .cell(cell_a)?
            .vertex_nodes
            .iter()
            .filter(|node_id| b_nodes.contains(node_id))
            .copied()
            .collect())
    }

    /// Find the leaf cell containing `point`
    ///
    /// The search starts from the first root cell whose bounds (inclusive) contain `point` and descends through
    /// the first child containing it at each level. Returns `None` if the point is outside the Grid.
    pub fn find_leaf(&self, point: &Point) -> Option<usize> {
        if point.dim() != self.dim {
            return None;
        }

        let mut current = self
            .cells
            .iter()
            .filter(|cell| cell.parent_id().is_none())
            .find(|cell| self.contains(cell, point))?;

        while let Some(child_ids) = current.child_ids() {
            current = child_ids
                .iter()
                .map(|child_id| &self.cells[*child_id])
                .find(|child| self.contains(child, point))?;
        }

        Some(current.id)
    }

    /// Get a list of a cell's descendant's IDs (depth first)
    pub fn descendant_cells(
        &self,
        cell_id: usize,
        include_starting_cell: bool,
    ) -> Result<Vec<usize>, MeshAccessError> {
        self.cell(cell_id)?;
        let mut descendants = Vec::new();
        self.rec_descendant_cells(cell_id, include_starting_cell, &mut descendants);
        Ok(descendants)
    }

    fn rec_descendant_cells(&self, cell_id: usize, include: bool, desc: &mut Vec<usize>) {
        if include {
            desc.push(cell_id);
        }
        if let Some(child_ids) = self.cells[cell_id].child_ids() {
            for child_id in child_ids {
                self.rec_descendant_cells(*child_id, true, desc);
            }
        }
    }

    /// Get a list of a cell's ancestor's IDs (nearest first)
    pub fn ancestor_cells(
        &self,
        cell_id: usize,
        include_starting_cell: bool,
    ) -> Result<Vec<usize>, MeshAccessError> {
        let cell = self.cell(cell_id)?;
        Ok(include_starting_cell
            .then_some(cell_id)
            .into_iter()
            .chain(cell.loc_stack().iter().rev().map(|(id, _)| *id))
            .collect())
    }

    /// Iterate over the cells that have not been h-refined
    pub fn leaf_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter().filter(|cell| !cell.has_children())
    }

    /// Deepest refinement level among all cells
    pub fn max_level(&self) -> u8 {
        self.cells.iter().map(|cell| cell.level()).max().unwrap_or(0)
    }

    /// Determine if this cell can be h-refined
    /// * returns false if the cell already has children
    /// * returns false if the cell is degenerate or its children would be narrower than [MIN_CELL_WIDTH]
    /// * returns false if the cell's midpoint can't be represented apart from its corners
    /// * returns an `Err` if the Grid doesn't have `cell_id`
    pub fn cell_is_refineable(&self, cell_id: usize) -> Result<bool, HRefError> {
        let cell = self
            .cells
            .get(cell_id)
            .ok_or(HRefError::CellDoesNotExist(cell_id))?;

        let [low, high] = self.bounds_of(cell);
        Ok(!cell.has_children() && self.refinement_midpoint(cell_id, low, high).is_ok())
    }

    // ----------------------------------------------------------------------------------------------------
    // h-refinement methods
    // ----------------------------------------------------------------------------------------------------

    /// Split a cell into `2^D` children by bisecting it along every axis
    ///
    /// Returns the IDs of the new cells in [Orthant] order. Nothing is modified if an error is returned.
    pub fn make_childs(&mut self, cell_id: usize) -> Result<SmallVec<[usize; 8]>, HRefError> {
        let child_points = self.plan_refinement(cell_id)?;
        self.commit_refinement(cell_id, child_points)
    }

    /// h-refine all leaf cells which are eligible for h-refinement
    pub fn global_refinement(&mut self) -> Result<Vec<usize>, HRefError> {
        self.execute_refinements(
            self.leaf_cells()
                .filter(|cell| matches!(self.cell_is_refineable(cell.id), Ok(true)))
                .map(|cell| cell.id)
                .collect(),
        )
    }

    /// h-refine a list of cells by their ID
    pub fn refine_cells(&mut self, cell_ids: &[usize]) -> Result<Vec<usize>, HRefError> {
        self.execute_refinements(cell_ids.to_vec())
    }

    /// h-refine the eligible leaf cells selected by an external filter function
    ///
    /// The filter is evaluated for all cells in parallel.
    pub fn refine_with_filter<F>(&mut self, filt: F) -> Result<Vec<usize>, HRefError>
    where
        F: Fn(&Grid, &GridCell) -> bool + Sync,
    {
        let selected: Vec<usize> = self
            .cells
            .par_iter()
            .filter(|cell| matches!(self.cell_is_refineable(cell.id), Ok(true)))
            .filter(|cell| filt(self, *cell))
            .map(|cell| cell.id)
            .collect();

        self.execute_refinements(selected)
    }

    /// Execute a batch of h-refinements on cells specified by their ID
    ///
    /// The whole batch is validated before any cell is refined. Cells are refined in ascending ID order, and the
    /// IDs of all new cells are returned.
    #[tracing::instrument(level = "debug", skip_all, fields(batch_size = cell_ids.len()))]
    pub fn execute_refinements(&mut self, cell_ids: Vec<usize>) -> Result<Vec<usize>, HRefError> {
        let mut batch = BTreeSet::new();
        for cell_id in cell_ids {
            if cell_id >= self.cells.len() {
                return Err(HRefError::CellDoesNotExist(cell_id));
            }
            if !batch.insert(cell_id) {
                return Err(HRefError::DoubleRefinement(cell_id));
            }
        }

        let plans = batch
            .into_iter()
            .map(|cell_id| Ok((cell_id, self.plan_refinement(cell_id)?)))
            .collect::<Result<Vec<_>, HRefError>>()?;

        let mut new_cell_ids = Vec::with_capacity(plans.len() * self.topology.num_corners());
        for (cell_id, child_points) in plans {
            new_cell_ids.extend(self.commit_refinement(cell_id, child_points)?);
        }

        tracing::info!(
            new_cells = new_cell_ids.len(),
            nodes = self.ndb.len(),
            "executed h-refinements"
        );

        Ok(new_cell_ids)
    }

    /// Validate an h-refinement and compute the vertex locations of every child
    fn plan_refinement(&self, cell_id: usize) -> Result<ChildPoints, HRefError> {
        let cell = self
            .cells
            .get(cell_id)
            .ok_or(HRefError::CellDoesNotExist(cell_id))?;
        if cell.has_children() {
            return Err(HRefError::CellHasChildren(cell_id));
        }

        let [low, high] = self.bounds_of(cell);
        let mid = self.refinement_midpoint(cell_id, low, high)?;
        let levels = [low, &mid, high];
        let num_corners = self.topology.num_corners();

        Ok((0..num_corners)
            .map(|orthant| {
                (0..num_corners)
                    .map(|corner| {
                        Point::new(
                            self.topology
                                .child_corner_levels(orthant, corner)
                                .iter()
                                .enumerate()
                                .map(|(axis, level)| levels[*level][axis])
                                .collect::<SmallVec<[f64; 3]>>(),
                        )
                    })
                    .collect()
            })
            .collect())
    }

    /// Register the Nodes and child cells produced by [`Self::plan_refinement`]
    fn commit_refinement(
        &mut self,
        cell_id: usize,
        child_points: ChildPoints,
    ) -> Result<SmallVec<[usize; 8]>, HRefError> {
        let first_child_id = self.cells.len();
        let num_nodes_before = self.ndb.len();

        let mut children = Vec::with_capacity(child_points.len());
        for (orthant, points) in child_points.into_iter().enumerate() {
            let mut vertex_nodes = SmallVec::with_capacity(points.len());
            for point in points {
                vertex_nodes.push(self.ndb.get_or_create(point)?);
            }

            children.push(GridCell::new_child(
                first_child_id + orthant,
                vertex_nodes,
                &self.cells[cell_id],
                Orthant(orthant),
            ));
        }

        let child_ids: SmallVec<[usize; 8]> = children.iter().map(|child| child.id).collect();
        for child in children {
            for node_id in child.vertex_nodes.iter() {
                self.ndb.connect_cell(*node_id, child.id);
            }
            self.cells.push(child);
        }
        self.cells[cell_id].set_children(child_ids.clone());

        tracing::debug!(
            cell_id,
            level = self.cells[cell_id].level(),
            children = ?child_ids.as_slice(),
            new_nodes = self.ndb.len() - num_nodes_before,
            "h-refined cell"
        );

        Ok(child_ids)
    }

    /// The point that bisects a cell along every axis
    ///
    /// The midpoint must land strictly between `low` and `high` on every axis. Far from the origin the float
    /// spacing can exceed [MIN_CELL_WIDTH], in which case the midpoint collapses onto a corner.
    fn refinement_midpoint(&self, cell_id: usize, low: &Point, high: &Point) -> Result<Point, HRefError> {
        if (0..self.dim).any(|axis| low.axis_order(high, axis) != Ordering::Less) {
            return Err(HRefError::DegenerateCell(cell_id));
        }
        if (0..self.dim).any(|axis| (high[axis] - low[axis]) / 2.0 < MIN_CELL_WIDTH) {
            return Err(HRefError::MinCellWidth(cell_id));
        }

        let mid = Point::between(low, high);
        if (0..self.dim).any(|axis| {
            low.axis_order(&mid, axis) != Ordering::Less
                || mid.axis_order(high, axis) != Ordering::Less
        }) {
            return Err(HRefError::MinCellWidth(cell_id));
        }
        Ok(mid)
    }

    // ----------------------------------------------------------------------------------------------------
    // Internal helpers
    // ----------------------------------------------------------------------------------------------------

    /// Every vertex must match the low or high corner along each axis, as selected by its corner code
    fn check_box_corners(&self, points: &[&Point]) -> Result<(), MeshAccessError> {
        let last = points.len() - 1;
        let (low, high) = (points[0], points[last]);

        if (0..self.dim).any(|axis| low.axis_order(high, axis) != Ordering::Less) {
            return Err(MeshAccessError::MalformedCell { corner: last });
        }

        for (corner, point) in points.iter().enumerate() {
            let on_corner = (0..self.dim).all(|axis| {
                let expected = if self.topology.corner_bit(corner, axis) == 1 {
                    high
                } else {
                    low
                };
                point.axis_order(expected, axis) == Ordering::Equal
            });
            if !on_corner {
                return Err(MeshAccessError::MalformedCell { corner });
            }
        }
        Ok(())
    }

    fn node_point(&self, node_id: usize) -> &Point {
        &self.ndb.all_nodes()[node_id].coords
    }

    fn bounds_of(&self, cell: &GridCell) -> [&Point; 2] {
        [
            self.node_point(cell.vertex_nodes[0]),
            self.node_point(cell.vertex_nodes[cell.vertex_nodes.len() - 1]),
        ]
    }

    fn contains(&self, cell: &GridCell, point: &Point) -> bool {
        let [low, high] = self.bounds_of(cell);
        point.within(low, high)
    }

    // ----------------------------------------------------------------------------------------------------
    // Export
    // ----------------------------------------------------------------------------------------------------

    /// Print the Grid to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let grid_object = object! {
            "Dimension": self.dim,
            "EdgePairs": JsonValue::from(self.topology.edge_pairs().iter().map(|&[i, j]| array![i, j]).collect::<Vec<_>>()),
            "Nodes": JsonValue::from(self.ndb.all_nodes().iter().map(|node| node.to_json()).collect::<Vec<_>>()),
            "Cells": JsonValue::from(self.cells.iter().map(|cell| cell.to_json()).collect::<Vec<_>>()),
            "MeshGrid": object! {
                "shape": self.mesh.shape().to_vec(),
                "points": JsonValue::from(self.mesh.axis_points().iter().map(|coords| JsonValue::from(coords.clone())).collect::<Vec<_>>()),
            },
        };

        grid_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

/// Register every point of `mesh` with `ndb`, returning the Node IDs in row-major mesh order
pub fn create_nodes_from_mg(
    ndb: &mut NodeDataBase,
    mesh: &MeshGrid,
) -> Result<Vec<usize>, MeshAccessError> {
    if ndb.dim() != mesh.dim() {
        return Err(MeshAccessError::DimensionMismatch {
            expected: ndb.dim(),
            found: mesh.dim(),
        });
    }

    mesh.points().map(|point| ndb.get_or_create(point)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshgrid::{linspace, meshgrid_ij};
    use approx::assert_relative_eq;

    fn grid_2d(n: usize) -> Grid {
        let axis = linspace(-4.0, 4.0, n);
        Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis])).unwrap()
    }

    fn points(coords: &[&[f64]]) -> Vec<Point> {
        coords.iter().map(|c| Point::from_slice(c)).collect()
    }

    fn owned(refs: Vec<&Point>) -> Vec<Point> {
        refs.into_iter().cloned().collect()
    }

    #[test]
    fn initial_grid_2d() {
        let grid = grid_2d(9);

        assert_eq!(grid.dim(), 2);
        assert_eq!(grid.idx_edge_pairs(), &[[0, 1], [0, 2], [1, 3], [2, 3]]);
        assert_eq!(grid.num_initial_cells(), 64);
        assert_eq!(grid.ndb().len(), 81);
        assert_eq!(grid.mg_shape(), &[9, 9]);
        assert_eq!(grid.all_mg_points().len(), 2);

        assert_eq!(
            owned(grid.vertex_coords(0).unwrap()),
            points(&[&[-4.0, -4.0], &[-4.0, -3.0], &[-3.0, -4.0], &[-3.0, -3.0]])
        );
        // second cell steps along the last axis
        assert_eq!(
            owned(grid.vertex_coords(1).unwrap()),
            points(&[&[-4.0, -3.0], &[-4.0, -2.0], &[-3.0, -3.0], &[-3.0, -2.0]])
        );
        assert_eq!(
            *grid.cell_bounds(63).unwrap()[1],
            Point::from([4.0, 4.0])
        );
    }

    #[test]
    fn subdivision_2d() {
        let mut grid = grid_2d(9);

        let children = grid.make_childs(0).unwrap();
        assert_eq!(children.as_slice(), &[64, 65, 66, 67]);
        assert_eq!(grid.num_cells(), 68);
        assert_eq!(grid.ndb().len(), 86);

        assert_eq!(
            owned(grid.vertex_coords(64).unwrap()),
            points(&[&[-4.0, -4.0], &[-4.0, -3.5], &[-3.5, -4.0], &[-3.5, -3.5]])
        );
        assert_eq!(
            owned(grid.vertex_coords(67).unwrap()),
            points(&[&[-3.5, -3.5], &[-3.5, -3.0], &[-3.0, -3.5], &[-3.0, -3.0]])
        );

        let grandchildren = grid.make_childs(64).unwrap();
        assert_eq!(grandchildren.len(), 4);
        assert_eq!(grid.num_cells(), 72);

        for parent_id in [0, 64] {
            let parent = grid.cell(parent_id).unwrap();
            let [low, high] = grid.cell_bounds(parent_id).unwrap();

            for (orthant, child_id) in parent.child_ids().unwrap().iter().enumerate() {
                let child = grid.cell(*child_id).unwrap();
                assert_eq!(child.parent_id(), Some(parent_id));
                assert_eq!(child.level(), parent.level() + 1);
                assert_eq!(child.orthant(), Some(Orthant(orthant)));

                let [child_low, child_high] = grid.cell_bounds(*child_id).unwrap();
                for axis in 0..2 {
                    let [lo, hi] = Orthant(orthant).sub_range(axis, 2, [low[axis], high[axis]]);
                    assert_relative_eq!(child_low[axis], lo);
                    assert_relative_eq!(child_high[axis], hi);
                }
            }
        }
        assert_eq!(grid.cell(68).unwrap().loc_stack(), &[(0, Orthant(0)), (64, Orthant(0))]);
        assert_eq!(grid.max_level(), 2);
    }

    #[test]
    fn subdivision_3d() {
        let axis = linspace(-4.0, 4.0, 9);
        let mut grid =
            Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis.clone(), axis])).unwrap();

        assert_eq!(grid.num_initial_cells(), 512);
        assert_eq!(grid.idx_edge_pairs().len(), 12);

        let vertices = grid.vertex_coords(0).unwrap();
        assert_eq!(*vertices[0], Point::from([-4.0, -4.0, -4.0]));
        assert_eq!(*vertices[3], Point::from([-4.0, -3.0, -3.0]));

        let children = grid.make_childs(0).unwrap();
        assert_eq!(children.len(), 8);
        assert_eq!(
            owned(grid.vertex_coords(children[0]).unwrap()),
            points(&[
                &[-4.0, -4.0, -4.0],
                &[-4.0, -4.0, -3.5],
                &[-4.0, -3.5, -4.0],
                &[-4.0, -3.5, -3.5],
                &[-3.5, -4.0, -4.0],
                &[-3.5, -4.0, -3.5],
                &[-3.5, -3.5, -4.0],
                &[-3.5, -3.5, -3.5],
            ])
        );

        let grandchildren = grid.make_childs(children[0]).unwrap();
        assert_eq!(grandchildren.len(), 8);
        assert_eq!(grid.num_cells(), 512 + 8 + 8);
        // 19 new nodes from the first bisection (12 edges, 6 faces, 1 center), 19 again from the second
        assert_eq!(grid.ndb().len(), 729 + 19 + 19);
    }

    #[test]
    fn neighbors_share_nodes() {
        let mut grid = grid_2d(9);

        let a = grid.make_childs(0).unwrap();
        let b = grid.make_childs(1).unwrap();

        // the midpoint of the face between cells 0 and 1 is created once
        assert_eq!(grid.ndb().len(), 81 + 5 + 4);
        assert_eq!(
            grid.cell(a[1]).unwrap().vertex_nodes[3],
            grid.cell(b[0]).unwrap().vertex_nodes[2]
        );
        assert_eq!(grid.shared_nodes(a[1], b[0]).unwrap().len(), 2);
        assert_eq!(grid.shared_nodes(a[0], b[0]).unwrap(), Vec::<usize>::new());

        let face_mid = grid.ndb().get(&Point::from([-3.5, -3.0])).unwrap();
        assert_eq!(grid.cells_at_node(face_mid).unwrap(), &[a[1], a[3], b[0], b[2]]);
    }

    #[test]
    fn refinement_errors_leave_grid_unchanged() {
        let mut grid = grid_2d(9);
        grid.make_childs(0).unwrap();

        let num_cells = grid.num_cells();
        let num_nodes = grid.ndb().len();

        assert_eq!(grid.make_childs(0), Err(HRefError::CellHasChildren(0)));
        assert_eq!(grid.make_childs(5000), Err(HRefError::CellDoesNotExist(5000)));
        assert_eq!(grid.refine_cells(&[3, 3]), Err(HRefError::DoubleRefinement(3)));
        assert_eq!(grid.refine_cells(&[3, 5000]), Err(HRefError::CellDoesNotExist(5000)));
        // cell 3 is valid, but the batch is rejected as a whole
        assert_eq!(grid.refine_cells(&[3, 0]), Err(HRefError::CellHasChildren(0)));

        assert_eq!(grid.num_cells(), num_cells);
        assert_eq!(grid.ndb().len(), num_nodes);
        assert!(!grid.cell(3).unwrap().has_children());
    }

    #[test]
    #[should_panic]
    fn double_refinement() {
        let mut grid = grid_2d(5);
        grid.refine_cells(&[1, 2, 1]).unwrap();
    }

    #[test]
    fn batch_refinement() {
        let mut grid = grid_2d(9);

        let new_cells = grid.refine_cells(&[5, 3]).unwrap();
        assert_eq!(new_cells, (64..72).collect::<Vec<_>>());
        // ascending ID order
        assert_eq!(grid.cell(3).unwrap().child_ids(), Some(&[64, 65, 66, 67][..]));
        assert_eq!(grid.cell(5).unwrap().child_ids(), Some(&[68, 69, 70, 71][..]));
    }

    #[test]
    fn global_refinement() {
        let axis = linspace(-1.0, 1.0, 3);
        let mut grid = Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis])).unwrap();

        assert_eq!(grid.global_refinement().unwrap().len(), 16);
        assert_eq!(grid.num_cells(), 20);
        assert_eq!(grid.leaf_cells().count(), 16);
        assert_eq!(grid.max_level(), 1);
        assert_eq!(grid.ndb().len(), 25);

        grid.global_refinement().unwrap();
        assert_eq!(grid.leaf_cells().count(), 64);
        assert_eq!(grid.ndb().len(), 81);
    }

    #[test]
    fn refine_with_filter() {
        let mut grid = grid_2d(9);

        let new_cells = grid
            .refine_with_filter(|grid, cell| grid.cell_center(cell.id).unwrap()[0] < -3.0)
            .unwrap();
        assert_eq!(new_cells.len(), 32);
        assert!((0..8).all(|cell_id| grid.cell(cell_id).unwrap().has_children()));
        assert!(!grid.cell(8).unwrap().has_children());

        // already refined cells are skipped
        let new_cells = grid
            .refine_with_filter(|grid, cell| grid.cell_center(cell.id).unwrap()[0] < -3.0)
            .unwrap();
        assert_eq!(new_cells.len(), 8 * 4 * 4);
        assert_eq!(grid.max_level(), 2);
    }

    #[test]
    fn min_cell_width() {
        let mut grid = Grid::from_arrays(vec![linspace(0.0, 1.0, 2).into_dyn()]).unwrap();

        let mut leaf = 0;
        let mut num_refinements = 0;
        let err = loop {
            match grid.make_childs(leaf) {
                Ok(children) => {
                    leaf = children[0];
                    num_refinements += 1;
                }
                Err(err) => break err,
            }
        };

        // a half-width of 2^-30 is the first one below MIN_CELL_WIDTH
        assert_eq!(num_refinements, 29);
        assert_eq!(err, HRefError::MinCellWidth(leaf));
        assert_eq!(grid.cell(leaf).unwrap().level(), 29);
        assert!(!grid.cell_is_refineable(leaf).unwrap());
        assert!(matches!(grid.cell_is_refineable(10_000), Err(HRefError::CellDoesNotExist(_))));
    }

    #[test]
    fn refinement_far_from_origin() {
        let mut grid =
            Grid::from_arrays(vec![linspace(1e8, 1e8 + 1.0, 2).into_dyn()]).unwrap();

        let mut leaf = 0;
        let mut num_refinements = 0;
        let err = loop {
            match grid.make_childs(leaf) {
                Ok(children) => {
                    leaf = children[0];
                    num_refinements += 1;
                }
                Err(err) => break err,
            }
        };

        // float spacing near 1e8 is 2^-26, so a cell of that width has no representable midpoint
        assert_eq!(num_refinements, 26);
        assert_eq!(err, HRefError::MinCellWidth(leaf));
        assert!(!grid.cell_is_refineable(leaf).unwrap());

        for cell in grid.cells() {
            assert_ne!(cell.vertex_nodes[0], cell.vertex_nodes[1]);
            let [low, high] = grid.cell_bounds(cell.id).unwrap();
            assert!(low < high);
        }
    }

    #[test]
    fn decreasing_mesh() {
        let mut grid = Grid::from_arrays(vec![linspace(1.0, 0.0, 2).into_dyn()]).unwrap();
        assert_eq!(grid.make_childs(0), Err(HRefError::DegenerateCell(0)));
        assert!(!grid.cell_is_refineable(0).unwrap());
        assert_eq!(grid.num_cells(), 1);
    }

    #[test]
    fn inserted_cells() {
        let mut grid = grid_2d(3);

        // a cell spanning the whole grid
        let big = grid.insert_cell(&[0, 2, 6, 8]).unwrap();
        assert_eq!(big, 4);
        assert_eq!(grid.cell(big).unwrap().level(), 0);
        assert_eq!(grid.num_initial_cells(), 4);

        // its children reuse the nodes of the initial cells
        let num_nodes = grid.ndb().len();
        grid.make_childs(big).unwrap();
        assert_eq!(grid.ndb().len(), num_nodes);

        let num_cells = grid.num_cells();
        assert_eq!(
            grid.insert_cell(&[0, 0, 3, 3]),
            Err(MeshAccessError::MalformedCell { corner: 3 })
        );
        // (0, 0) is not the upper-left corner of [-4, 4]^2
        assert_eq!(
            grid.insert_cell(&[0, 4, 3, 8]),
            Err(MeshAccessError::MalformedCell { corner: 1 })
        );
        // corners listed out of order
        assert_eq!(
            grid.insert_cell(&[0, 6, 2, 8]),
            Err(MeshAccessError::MalformedCell { corner: 1 })
        );
        assert_eq!(grid.num_cells(), num_cells);
        assert!(!grid.cells_at_node(4).unwrap().contains(&num_cells));

        assert_eq!(
            grid.insert_cell(&[0, 1, 2]),
            Err(MeshAccessError::WrongNumberOfVertices {
                dim: 2,
                expected: 4,
                found: 3
            })
        );
        assert_eq!(
            grid.insert_cell(&[0, 1, 2, 900]),
            Err(MeshAccessError::NodeDoesNotExist(900))
        );
    }

    #[test]
    fn tree_traversal() {
        let mut grid = grid_2d(9);
        grid.make_childs(0).unwrap();
        grid.make_childs(64).unwrap();

        assert_eq!(
            grid.descendant_cells(0, true).unwrap(),
            vec![0, 64, 68, 69, 70, 71, 65, 66, 67]
        );
        assert_eq!(grid.descendant_cells(65, false).unwrap(), Vec::<usize>::new());
        assert_eq!(grid.ancestor_cells(70, false).unwrap(), vec![64, 0]);
        assert_eq!(grid.ancestor_cells(70, true).unwrap(), vec![70, 64, 0]);
        assert_eq!(grid.ancestor_cells(5, false).unwrap(), Vec::<usize>::new());
        assert_eq!(
            grid.descendant_cells(100, true),
            Err(MeshAccessError::CellDoesNotExist(100))
        );
    }

    #[test]
    fn find_leaf() {
        let mut grid = grid_2d(9);
        grid.make_childs(0).unwrap();
        grid.make_childs(64).unwrap();

        assert_eq!(grid.find_leaf(&Point::from([-3.9, -3.9])), Some(68));
        assert_eq!(grid.find_leaf(&Point::from([-3.25, -3.75])), Some(66));
        assert_eq!(grid.find_leaf(&Point::from([0.5, 0.5])), Some(36));
        assert_eq!(grid.find_leaf(&Point::from([4.0, 4.0])), Some(63));
        assert_eq!(grid.find_leaf(&Point::from([4.5, 0.0])), None);
        assert_eq!(grid.find_leaf(&Point::from([0.0, 0.0, 0.0])), None);
    }

    #[test]
    fn geometry_queries() {
        let grid = grid_2d(9);

        let edges = grid.edge_coords(0).unwrap();
        assert_eq!(edges.len(), 4);
        assert_eq!(*edges[1][0], Point::from([-4.0, -4.0]));
        assert_eq!(*edges[1][1], Point::from([-3.0, -4.0]));

        assert_eq!(grid.cell_center(9).unwrap(), Point::from([-2.5, -2.5]));
        assert_eq!(grid.all_cell_vertex_coords().len(), 64);
        assert!(grid.vertex_coords(64).is_err());
    }

    #[test]
    fn leaf_edges() {
        let axis = linspace(0.0, 1.0, 3);
        let mut grid = Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis])).unwrap();
        assert_eq!(grid.leaf_edge_segments().len(), 12);

        grid.make_childs(0).unwrap();
        // two outer edges of cell 0 are replaced by a 2x2 block of fine edges
        assert_eq!(grid.leaf_edge_segments().len(), 10 + 12);
    }

    #[test]
    fn node_adjacency() {
        let axis = linspace(-1.0, 1.0, 3);
        let mut grid = Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis])).unwrap();

        let center = grid.ndb().get(&Point::from([0.0, 0.0])).unwrap();
        assert_eq!(center, 4);
        assert_eq!(grid.cells_at_node(center).unwrap(), &[0, 1, 2, 3]);

        let children = grid.make_childs(0).unwrap();
        assert_eq!(grid.cells_at_node(center).unwrap(), &[0, 1, 2, 3, children[3]]);
        assert!(grid.cells_at_node(1000).is_err());
    }

    #[test]
    fn node_registration_order() {
        let axis = linspace(0.0, 2.0, 3);
        let mesh = MeshGrid::new(meshgrid_ij(&[axis.clone(), axis])).unwrap();

        let mut ndb = NodeDataBase::new(2);
        let ids = create_nodes_from_mg(&mut ndb, &mesh).unwrap();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        assert_eq!(ndb.node(1).unwrap().coords, Point::from([0.0, 1.0]));
        assert_eq!(ndb.node(3).unwrap().coords, Point::from([1.0, 0.0]));

        let mut ndb_3d = NodeDataBase::new(3);
        assert_eq!(
            create_nodes_from_mg(&mut ndb_3d, &mesh),
            Err(MeshAccessError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn malformed_input() {
        assert!(matches!(Grid::from_arrays(Vec::new()), Err(GridError::EmptyMesh)));
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn json_export() {
        let mut grid = grid_2d(3);
        grid.make_childs(0).unwrap();

        let path = std::env::temp_dir().join("nd_grid_export_test.json");
        grid.export_to_json(&path).unwrap();

        let exported = json::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["Dimension"], 2);
        assert_eq!(exported["Cells"].len(), 8);
        assert_eq!(exported["Nodes"].len(), grid.ndb().len());
        assert_eq!(exported["EdgePairs"][3][1], 3);
        assert_eq!(exported["Cells"][0]["children"].len(), 4);
        assert_eq!(exported["Cells"][4]["parent"], 0);
        assert_eq!(exported["MeshGrid"]["shape"][0], 3);

        std::fs::remove_file(&path).unwrap();
    }
}

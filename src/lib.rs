//! Dimension-generic adaptive hypercube grids
//!
//! A [Grid] is built from a rectangular coordinate mesh and holds one [GridCell] per block of adjacent mesh
//! points. Any cell can be h-refined into `2^D` children. All vertices are deduplicated through the Grid's
//! [NodeDataBase], so cells that touch along a face, edge or corner always share the same [Node]s.
//!
//! ```
//! use nd_grid::{linspace, meshgrid_ij, Grid};
//!
//! let axis = linspace(-4.0, 4.0, 9);
//! let mut grid = Grid::from_arrays(meshgrid_ij(&[axis.clone(), axis])).unwrap();
//! assert_eq!(grid.num_initial_cells(), 64);
//!
//! let children = grid.make_childs(0).unwrap();
//! assert_eq!(children.len(), 4);
//! assert_eq!(grid.cell(children[0]).unwrap().parent_id(), Some(0));
//! ```

pub mod grid;
pub mod meshgrid;
pub mod util;

pub use grid::{
    cell::GridCell,
    create_nodes_from_mg,
    h_refinement::{HRefError, MeshAccessError, Orthant},
    node::Node,
    node_db::NodeDataBase,
    space::Point,
    topology::HypercubeTopology,
    Grid,
};
pub use meshgrid::{linspace, meshgrid_ij, GridError, MeshGrid};
pub use util::{absmax, modify_tuple};

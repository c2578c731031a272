//! Rectangular coordinate meshes used to seed a [Grid](crate::Grid)
//!
//! A mesh of dimension D is D coordinate arrays of one common D-dimensional shape, using "ij" indexing:
//! entry `[i_0, .., i_{D-1}]` of array `k` is the k-th coordinate of the mesh point at that multi-index, and
//! the first axis varies slowest when the arrays are flattened.

use crate::grid::space::Point;

use ndarray::{Array1, ArrayD, IxDyn};
use smallvec::SmallVec;
use thiserror::Error;

/// Maximum supported Grid dimension. GridCells have `2^D` vertices, so this is mostly a sanity limit.
pub const MAX_GRID_DIMENSION: usize = 10;

/// The Error Type for malformed coordinate meshes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("No coordinate arrays were provided; Cannot construct Grid!")]
    EmptyMesh,
    #[error("{0} coordinate arrays exceeds the maximum Grid dimension ({max}); Cannot construct Grid!", max = MAX_GRID_DIMENSION)]
    TooManyDimensions(usize),
    #[error("Coordinate array {axis} has {found} axes, expected {expected}; Cannot construct Grid!")]
    DimensionMismatch {
        axis: usize,
        expected: usize,
        found: usize,
    },
    #[error("Coordinate array {axis} has shape {found:?}, expected {expected:?}; Cannot construct Grid!")]
    ShapeMismatch {
        axis: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Axis {axis} has {samples} samples (at least 2 are needed to form a cell); Cannot construct Grid!")]
    TooFewSamples { axis: usize, samples: usize },
}

/// A validated rectangular coordinate mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGrid {
    shape: Vec<usize>,
    axis_points: Vec<Vec<f64>>,
}

impl MeshGrid {
    /// Validate a set of "ij" indexed coordinate arrays (as produced by [meshgrid_ij])
    ///
    /// Returns an error if:
    /// * there are no arrays, or more than [MAX_GRID_DIMENSION]
    /// * any array doesn't have one axis per coordinate array
    /// * the arrays don't all share the same shape
    /// * any axis has fewer than two samples
    pub fn new(arrays: Vec<ArrayD<f64>>) -> Result<Self, GridError> {
        let dim = arrays.len();
        if dim == 0 {
            return Err(GridError::EmptyMesh);
        }
        if dim > MAX_GRID_DIMENSION {
            return Err(GridError::TooManyDimensions(dim));
        }

        let shape = arrays[0].shape().to_vec();
        for (axis, array) in arrays.iter().enumerate() {
            if array.ndim() != dim {
                return Err(GridError::DimensionMismatch {
                    axis,
                    expected: dim,
                    found: array.ndim(),
                });
            }
            if array.shape() != shape.as_slice() {
                return Err(GridError::ShapeMismatch {
                    axis,
                    expected: shape.clone(),
                    found: array.shape().to_vec(),
                });
            }
        }

        if let Some((axis, samples)) = shape.iter().enumerate().find(|(_, n)| **n < 2) {
            return Err(GridError::TooFewSamples {
                axis,
                samples: *samples,
            });
        }

        // ndarray iterates in logical (row-major) order regardless of memory layout
        let axis_points = arrays
            .iter()
            .map(|array| array.iter().copied().collect())
            .collect();

        Ok(Self { shape, axis_points })
    }

    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    /// Number of samples along each axis
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_points(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of cells spanned by the mesh: `prod(n_k - 1)`
    pub fn num_cells(&self) -> usize {
        self.shape.iter().map(|n| n - 1).product()
    }

    /// The flattened coordinate arrays (one vector per axis, first axis slowest)
    pub fn axis_points(&self) -> &[Vec<f64>] {
        &self.axis_points
    }

    /// The mesh points in row-major order
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.num_points()).map(move |flat_idx| {
            Point::new(
                self.axis_points
                    .iter()
                    .map(|coords| coords[flat_idx])
                    .collect::<SmallVec<[f64; 3]>>(),
            )
        })
    }

    /// Row-major flat index of a multi-index into the mesh
    pub fn flat_index(&self, multi_index: &[usize]) -> usize {
        debug_assert_eq!(multi_index.len(), self.dim());
        multi_index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |flat, (idx, n)| flat * n + idx)
    }
}

/// `num` evenly spaced samples over `[start, stop]`
pub fn linspace(start: f64, stop: f64, num: usize) -> Array1<f64> {
    Array1::linspace(start, stop, num)
}

/// Build D "ij" indexed coordinate arrays from D one-dimensional axes
///
/// ```
/// use nd_grid::meshgrid::{linspace, meshgrid_ij};
///
/// let mg = meshgrid_ij(&[linspace(0.0, 1.0, 3), linspace(-1.0, 1.0, 5)]);
/// assert_eq!(mg[0].shape(), &[3, 5]);
/// assert_eq!(mg[0][[2, 0]], 1.0);
/// assert_eq!(mg[1][[2, 0]], -1.0);
/// ```
pub fn meshgrid_ij(axes: &[Array1<f64>]) -> Vec<ArrayD<f64>> {
    let shape: Vec<usize> = axes.iter().map(|axis| axis.len()).collect();

    (0..axes.len())
        .map(|k| ArrayD::from_shape_fn(IxDyn(&shape), |idx| axes[k][idx[k]]))
        .collect()
}

use super::space::Point;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use smallvec::SmallVec;

/// A point in D-dimensional space shared by every [GridCell](super::cell::GridCell) that touches it.
///
/// Nodes are created by the [NodeDataBase](super::node_db::NodeDataBase) and never move.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub coords: Point,
    cells: SmallVec<[usize; 8]>,
}

impl Node {
    pub fn new(id: usize, coords: Point) -> Self {
        Self {
            id,
            coords,
            cells: SmallVec::new(),
        }
    }

    /// IDs of the GridCells which have this Node as a vertex (in the order they were connected)
    pub fn cell_ids(&self) -> &[usize] {
        &self.cells
    }

    pub(crate) fn connect_cell(&mut self, cell_id: usize) {
        if !self.cells.contains(&cell_id) {
            self.cells.push(cell_id);
        }
    }

    /// Produce a Json Object that describes this Node
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "coords": &self.coords,
            "cells": self.cells.to_vec(),
        }
    }
}

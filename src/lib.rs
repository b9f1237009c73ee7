/*
    Carving is an interactive supervoxel segmentation engine: a region adjacency graph over a
    labeled grid, boundary-strength edge weights, foreground/background seeds and a seeded
    minimum cut.
*/

pub mod builder;
pub mod edge_coords;
pub mod error;
pub mod features;
pub mod grid;
pub mod rag;
pub mod segmentor;
pub mod snapshot;
pub mod solver;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::builder::SegmentorBuilder;
pub use crate::edge_coords::{edge_coords_2d, EdgeCoordLookup};
pub use crate::error::{CarvingError, Result};
pub use crate::features::EdgeAggregation;
pub use crate::grid::{Grid, Roi};
pub use crate::rag::GridRag;
pub use crate::segmentor::GridSegmentor;
pub use crate::snapshot::{read_topology, write_topology, SessionSnapshot};
pub use crate::solver::DinicSolver;
pub use crate::traits::{Cut, CutSolver, Label};
pub use crate::types::{canonical, Edge, EdgeId, NodeId, Seed};

use crate::error::Result;
use crate::types::{Edge, Seed};

/// Traits that the label value type of a grid should implement for use by GridRag.
///
/// A label value is the node id of the supervoxel it belongs to, so every
/// label type must convert losslessly into a `u32` node id.
///
/// # Examples
///
/// ```ignore
/// let labels = Grid::<u16, 3>::from_vec([64, 64, 64], volume)?;
/// let mut rag = GridRag::new();
/// rag.assign_labels(labels);
/// ```
pub trait Label: Copy + Send + Sync + Into<u32> + std::fmt::Debug + 'static {
    fn node_id(self) -> u32 {
        self.into()
    }
}

impl Label for u8 {}
impl Label for u16 {}
impl Label for u32 {}

/// Outcome of a seeded minimum cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    /// One entry per node slot; `true` means the node ends up on the foreground side.
    pub foreground: Vec<bool>,
    /// Total weight of the edges crossing the cut.
    pub value: f64,
}

/// Traits that a min-cut solver should implement for use by GridSegmentor.
///
/// The solver receives an undirected graph over `node_count` node slots, one
/// weight per edge (the capacity in both directions), and one seed per slot.
/// Foreground seeds are pinned to the source side, background seeds to the
/// sink side.
///
/// Implementations must be deterministic for identical input. When several
/// minimum cuts exist, the one with the smallest foreground set wins, which
/// means ties are resolved towards background.
///
/// # Examples
///
/// ```ignore
/// struct Everything;
/// impl CutSolver for Everything {
///     fn solve(&self, node_count: usize, _: &[Edge], _: &[f32], seeds: &[Seed]) -> Result<Cut> {
///         Ok(Cut {
///             foreground: seeds.iter().map(|s| *s != Seed::Background).collect(),
///             value: 0.0,
///         })
///     }
/// }
/// ```
pub trait CutSolver: Send + Sync {
    fn solve(
        &self,
        node_count: usize,
        edges: &[Edge],
        weights: &[f32],
        seeds: &[Seed],
    ) -> Result<Cut>;
}

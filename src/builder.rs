#[cfg(feature = "progress-bar")]
use indicatif::ProgressBar;

use crate::features::EdgeAggregation;
use crate::segmentor::GridSegmentor;
use crate::solver::DinicSolver;
use crate::traits::{CutSolver, Label};

/// SegmentorBuilder configures a GridSegmentor.
///
// - `aggregation` reduces the per-voxel-pair weight samples of an edge to one edge weight;
//   the mean is the default.
// - `progress` (feature `progress-bar`) reports the preprocessing stages on an indicatif bar.
///
#[derive(Clone, Default)]
pub struct SegmentorBuilder {
    aggregation: EdgeAggregation,

    #[cfg(feature = "progress-bar")]
    progress: Option<ProgressBar>,
}

impl SegmentorBuilder {
    pub fn set_aggregation(mut self, aggregation: EdgeAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn get_aggregation(&self) -> EdgeAggregation {
        self.aggregation
    }

    ///
    /// Creates an empty segmentor that cuts with [`DinicSolver`].
    ///
    pub fn build<const D: usize, L: Label>(self) -> GridSegmentor<D, L> {
        GridSegmentor::from_parts(self, DinicSolver)
    }

    ///
    /// Creates an empty segmentor that cuts with a caller-provided solver.
    ///
    pub fn build_with_solver<const D: usize, L: Label, S: CutSolver>(
        self,
        solver: S,
    ) -> GridSegmentor<D, L, S> {
        GridSegmentor::from_parts(self, solver)
    }

    #[cfg(feature = "progress-bar")]
    pub fn progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    #[cfg(feature = "progress-bar")]
    pub(crate) fn progress_bar(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }
}

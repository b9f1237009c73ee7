use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::builder::SegmentorBuilder;
use crate::error::{CarvingError, Result};
use crate::features::EdgeAggregation;
use crate::grid::{Grid, Roi};
use crate::rag::GridRag;
use crate::snapshot::SessionSnapshot;
use crate::solver::DinicSolver;
use crate::traits::{CutSolver, Label};
use crate::types::{EdgeId, NodeId, Seed};
use crate::utils::{intersect_ids, sorted_ids};

/// Graph plus the per-edge and per-node arrays of one carving session.
struct Session<const D: usize, L> {
    rag: GridRag<D, L>,
    edge_weights: Vec<f32>,
    node_seeds: Vec<Seed>,
    result: Vec<bool>,
}

impl<const D: usize, L: Label> Session<D, L> {
    fn fresh(rag: GridRag<D, L>, edge_weights: Vec<f32>) -> Self {
        let slots = rag.node_slots();
        Self {
            rag,
            edge_weights,
            node_seeds: vec![Seed::Unseeded; slots],
            result: vec![false; slots],
        }
    }

    fn labels(&self) -> Result<&Grid<L, D>> {
        self.rag.labels().ok_or(CarvingError::UnpreprocessedState)
    }

    fn check_node_ids(&self, ids: &[NodeId]) -> Result<()> {
        let slots = self.node_seeds.len();
        match ids.iter().find(|&&id| id as usize >= slots) {
            Some(id) => Err(CarvingError::invalid_seed(format!(
                "node id {id} is outside 0..{slots}"
            ))),
            None => Ok(()),
        }
    }
}

/// Interactive seeded segmentation over a labeled grid.
///
/// A segmentor owns the region adjacency graph, the edge weights, the seeds
/// and the last result. All state sits behind one lock: mutators take it
/// exclusively, materializations share it, so a read never observes a
/// half-applied mutation.
///
/// # Examples
///
/// ```ignore
/// let segmentor = GridSegmentor::<3>::new();
/// segmentor.preprocessing(labels, &boundary_probabilities)?;
/// segmentor.add_seeds(&brush, &roi, 2)?;
/// segmentor.run()?;
/// let mask = segmentor.segmentation(&roi)?;
/// ```
pub struct GridSegmentor<const D: usize, L = u32, S = DinicSolver> {
    builder: SegmentorBuilder,
    solver: S,
    state: RwLock<Option<Session<D, L>>>,
}

impl<const D: usize, L: Label> GridSegmentor<D, L> {
    pub fn new() -> Self {
        SegmentorBuilder::default().build()
    }
}

impl<const D: usize, L: Label> Default for GridSegmentor<D, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize, L: Label, S: CutSolver> GridSegmentor<D, L, S> {
    pub(crate) fn from_parts(builder: SegmentorBuilder, solver: S) -> Self {
        Self {
            builder,
            solver,
            state: RwLock::new(None),
        }
    }

    pub fn aggregation(&self) -> EdgeAggregation {
        self.builder.get_aggregation()
    }

    fn read<R>(&self, f: impl FnOnce(&Session<D, L>) -> Result<R>) -> Result<R> {
        let guard = self.state.read();
        let session = guard.as_ref().ok_or(CarvingError::UnpreprocessedState)?;
        f(session)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Session<D, L>) -> Result<R>) -> Result<R> {
        let mut guard = self.state.write();
        let session = guard.as_mut().ok_or(CarvingError::UnpreprocessedState)?;
        f(session)
    }

    /// Builds the graph from `labels`, weights every edge from `weights`, and
    /// resets seeds and result.
    pub fn preprocessing<W>(&self, labels: Grid<L, D>, weights: &Grid<W, D>) -> Result<()>
    where
        W: Copy + Into<f64> + Sync,
    {
        if labels.shape() != weights.shape() {
            return Err(CarvingError::shape_mismatch(labels.shape(), weights.shape()));
        }

        let mut guard = self.state.write();
        let start_time = Instant::now();

        #[cfg(feature = "progress-bar")]
        if let Some(bar) = self.builder.progress_bar() {
            bar.set_length(2);
            bar.set_message("Discover region adjacency");
        }

        let mut rag = GridRag::new();
        rag.assign_labels(labels);

        #[cfg(feature = "progress-bar")]
        if let Some(bar) = self.builder.progress_bar() {
            bar.inc(1);
            bar.set_message("Accumulate edge weights");
        }

        let mut edge_weights = vec![0.0; rag.edge_num()];
        rag.accumulate_edge_features_into(weights, self.aggregation(), &mut edge_weights)?;

        #[cfg(feature = "progress-bar")]
        if let Some(bar) = self.builder.progress_bar() {
            bar.inc(1);
            bar.finish();
        }

        info!(
            nodes = rag.node_num(),
            edges = rag.edge_num(),
            elapsed = ?start_time.elapsed(),
            "preprocessing finished"
        );
        *guard = Some(Session::fresh(rag, edge_weights));
        Ok(())
    }

    /// Restores a whole session without recomputing topology or weights.
    ///
    /// Nonzero bytes of `result` mean foreground.
    pub fn preprocessing_from_serialization(
        &self,
        labels: Grid<L, D>,
        serialization: &[u32],
        edge_weights: &[f32],
        node_seeds: &[u8],
        result: &[u8],
    ) -> Result<()> {
        let mut rag = GridRag::new();
        rag.assign_labels_from_serialization(labels, serialization)?;

        if edge_weights.len() != rag.edge_num() {
            return Err(CarvingError::shape_mismatch(rag.edge_num(), edge_weights.len()));
        }
        let slots = rag.node_slots();
        if node_seeds.len() != slots {
            return Err(CarvingError::shape_mismatch(slots, node_seeds.len()));
        }
        if result.len() != slots {
            return Err(CarvingError::shape_mismatch(slots, result.len()));
        }
        let node_seeds = node_seeds
            .iter()
            .map(|&value| Seed::try_from(value))
            .collect::<Result<Vec<Seed>>>()?;

        info!(
            nodes = rag.node_num(),
            edges = rag.edge_num(),
            "restored session from serialization"
        );
        let session = Session {
            rag,
            edge_weights: edge_weights.to_vec(),
            node_seeds,
            result: result.iter().map(|&v| v != 0).collect(),
        };
        *self.state.write() = Some(session);
        Ok(())
    }

    /// Seeds the nodes under a brush stroke.
    ///
    /// `brush` covers exactly `roi`. A nonzero brush value becomes the seed of
    /// the node under that voxel. Any value above `max_valid_label` rejects
    /// the whole stroke. Returns the number of voxels applied.
    pub fn add_seeds(
        &self,
        brush: &Grid<u8, D>,
        roi: &Roi<D>,
        max_valid_label: u8,
    ) -> Result<usize> {
        if max_valid_label > Seed::Background.as_u8() {
            return Err(CarvingError::invalid_seed(format!(
                "max valid label {max_valid_label} exceeds the largest seed value {}",
                Seed::Background.as_u8()
            )));
        }

        self.write(|session| {
            let labels = session
                .rag
                .labels()
                .ok_or(CarvingError::UnpreprocessedState)?;
            roi.validate(&labels.shape())?;
            if brush.shape() != roi.shape() {
                return Err(CarvingError::shape_mismatch(roi.shape(), brush.shape()));
            }
            if let Some(value) = brush.data().iter().find(|&&v| v > max_valid_label) {
                return Err(CarvingError::invalid_seed(format!(
                    "brush value {value} exceeds max valid label {max_valid_label}"
                )));
            }

            let label_data = labels.data();
            let strides = labels.strides();
            let strokes = brush.data();
            let seeds = &mut session.node_seeds;
            let mut offset = 0;
            let mut applied = 0;

            roi.for_each_index(&strides, |index| {
                let value = strokes[offset];
                offset += 1;
                if value == 0 {
                    return;
                }
                let node = label_data[index].node_id() as usize;
                if let Ok(seed) = Seed::try_from(value) {
                    seeds[node] = seed;
                    applied += 1;
                }
            });

            debug!(applied, "added brush seeds");
            Ok(applied)
        })
    }

    /// Seeds nodes by id. Nodes not listed keep their seed.
    pub fn set_seeds(&self, foreground: &[NodeId], background: &[NodeId]) -> Result<()> {
        self.write(|session| {
            session.check_node_ids(foreground)?;
            session.check_node_ids(background)?;
            let both = intersect_ids(&sorted_ids(foreground), &sorted_ids(background));
            if let Some(id) = both.first() {
                return Err(CarvingError::invalid_seed(format!(
                    "node {id} is seeded as foreground and background"
                )));
            }

            for &id in foreground {
                session.node_seeds[id as usize] = Seed::Foreground;
            }
            for &id in background {
                session.node_seeds[id as usize] = Seed::Background;
            }
            debug!(
                foreground = foreground.len(),
                background = background.len(),
                "set node seeds"
            );
            Ok(())
        })
    }

    /// Overrides the result: `foreground` ids become foreground, everything
    /// else background. The solver is not involved.
    pub fn set_result_foreground(&self, foreground: &[NodeId]) -> Result<()> {
        self.write(|session| {
            session.check_node_ids(foreground)?;
            let mut result = vec![false; session.result.len()];
            for &id in foreground {
                result[id as usize] = true;
            }
            session.result = result;
            Ok(())
        })
    }

    /// Recomputes the result from seeds and edge weights.
    ///
    /// Without any foreground seed the result is all background.
    pub fn run(&self) -> Result<()> {
        self.write(|session| {
            let slots = session.node_seeds.len();
            if !session.node_seeds.contains(&Seed::Foreground) {
                session.result = vec![false; slots];
                debug!("no foreground seeds, result is all background");
                return Ok(());
            }

            let start_time = Instant::now();
            let cut = self.solver.solve(
                slots,
                session.rag.edges(),
                &session.edge_weights,
                &session.node_seeds,
            )?;
            if cut.foreground.len() != slots {
                return Err(CarvingError::solver_failure(format!(
                    "solver returned {} node labels for {slots} nodes",
                    cut.foreground.len()
                )));
            }

            debug!(
                cut = cut.value,
                foreground = cut.foreground.iter().filter(|&&fg| fg).count(),
                elapsed = ?start_time.elapsed(),
                "graph cut finished"
            );
            session.result = cut.foreground;
            Ok(())
        })
    }

    /// Runs [`run`](Self::run) on a worker thread.
    pub fn run_detached(self: &Arc<Self>) -> JoinHandle<Result<()>>
    where
        L: 'static,
        S: 'static,
    {
        let segmentor = Arc::clone(self);
        std::thread::spawn(move || segmentor.run())
    }

    /// Per-voxel result inside `roi`, as an ROI-shaped grid.
    pub fn segmentation(&self, roi: &Roi<D>) -> Result<Grid<bool, D>> {
        self.read(|session| {
            let labels = session.labels()?;
            roi.validate(&labels.shape())?;

            let shape = roi.shape();
            let volume = roi.volume();
            if volume == 0 {
                return Grid::from_vec(shape, Vec::new());
            }

            let label_data = labels.data();
            let strides = labels.strides();
            let result = &session.result;
            let mut out = vec![false; volume];

            out.par_chunks_mut(volume / shape[0])
                .enumerate()
                .for_each(|(k, row)| {
                    let mut offset = 0;
                    roi.axis0_slice(k).for_each_index(&strides, |index| {
                        row[offset] = result[label_data[index].node_id() as usize];
                        offset += 1;
                    });
                });

            Grid::from_vec(shape, out)
        })
    }

    pub fn super_voxel_seg(&self) -> Result<Vec<bool>> {
        self.read(|session| Ok(session.result.clone()))
    }

    pub fn super_voxel_seeds(&self) -> Result<Vec<u8>> {
        self.read(|session| Ok(session.node_seeds.iter().map(|s| s.as_u8()).collect()))
    }

    pub fn edge_weights(&self) -> Result<Vec<f32>> {
        self.read(|session| Ok(session.edge_weights.clone()))
    }

    pub fn node_num(&self) -> Result<usize> {
        self.read(|session| Ok(session.rag.node_num()))
    }

    pub fn edge_num(&self) -> Result<usize> {
        self.read(|session| Ok(session.rag.edge_num()))
    }

    pub fn max_node_id(&self) -> Result<Option<NodeId>> {
        self.read(|session| Ok(session.rag.max_node_id()))
    }

    pub fn max_edge_id(&self) -> Result<Option<EdgeId>> {
        self.read(|session| Ok(session.rag.max_edge_id()))
    }

    pub fn clear_seeds(&self) -> Result<()> {
        self.write(|session| {
            session.node_seeds.fill(Seed::Unseeded);
            Ok(())
        })
    }

    pub fn clear_segmentation(&self) -> Result<()> {
        self.write(|session| {
            session.result.fill(false);
            Ok(())
        })
    }

    pub fn serialize_graph(&self) -> Result<Vec<u32>> {
        self.read(|session| Ok(session.rag.serialize()))
    }

    /// Replaces the topology, keeping the label grid.
    ///
    /// Per-node arrays survive when the node slot count is unchanged, edge
    /// weights when the edge count is unchanged; otherwise they are reset.
    pub fn deserialize_graph(&self, serialization: &[u32]) -> Result<()> {
        self.write(|session| {
            session.labels()?;
            session.rag.deserialize(serialization)?;

            let slots = session.rag.node_slots();
            if session.node_seeds.len() != slots {
                warn!(slots, "node count changed, seeds and result were reset");
                session.node_seeds = vec![Seed::Unseeded; slots];
                session.result = vec![false; slots];
            }
            let edge_num = session.rag.edge_num();
            if session.edge_weights.len() != edge_num {
                warn!(edge_num, "edge count changed, edge weights were reset");
                session.edge_weights = vec![0.0; edge_num];
            }

            debug!(
                nodes = session.rag.node_num(),
                edges = edge_num,
                "deserialized graph"
            );
            Ok(())
        })
    }

    /// Everything needed to restore this session with [`restore`](Self::restore).
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        self.read(|session| {
            Ok(SessionSnapshot {
                topology: session.rag.serialize(),
                edge_weights: session.edge_weights.clone(),
                node_seeds: session.node_seeds.iter().map(|s| s.as_u8()).collect(),
                result: session.result.iter().map(|&fg| u8::from(fg)).collect(),
            })
        })
    }

    pub fn restore(&self, labels: Grid<L, D>, snapshot: &SessionSnapshot) -> Result<()> {
        self.preprocessing_from_serialization(
            labels,
            &snapshot.topology,
            &snapshot.edge_weights,
            &snapshot.node_seeds,
            &snapshot.result,
        )
    }
}

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CarvingError, Result};
use crate::grid::Grid;
use crate::rag::GridRag;
use crate::traits::Label;
use crate::types::{canonical, EdgeId};

/// How the per-voxel-pair samples of one edge are reduced to a single weight.
///
/// Every voxel pair that induces an edge contributes one sample: the mean of
/// the feature values at its two voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeAggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    fn push(&mut self, sample: f64) {
        self.sum += sample;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.count += 1;
    }

    fn merge(&mut self, other: &Accumulator) {
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
    }

    fn finish(&self, aggregation: EdgeAggregation) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        let value = match aggregation {
            EdgeAggregation::Mean => self.sum / self.count as f64,
            EdgeAggregation::Sum => self.sum,
            EdgeAggregation::Min => self.min,
            EdgeAggregation::Max => self.max,
        };
        value as f32
    }
}

impl<const D: usize, L: Label> GridRag<D, L> {
    /// Mean edge feature for every edge, in edge-id order.
    pub fn accumulate_edge_features<T>(&self, features: &Grid<T, D>) -> Result<Vec<f32>>
    where
        T: Copy + Into<f64> + Sync,
    {
        let mut out = vec![0.0; self.edge_num()];
        self.accumulate_edge_features_into(features, EdgeAggregation::Mean, &mut out)?;
        Ok(out)
    }

    /// Writes one aggregated feature per edge into `out`.
    ///
    /// Slabs along axis 0 are accumulated in parallel and merged in slab
    /// order, so the result does not depend on thread scheduling. `out` is
    /// only written once every sample has been collected.
    pub fn accumulate_edge_features_into<T>(
        &self,
        features: &Grid<T, D>,
        aggregation: EdgeAggregation,
        out: &mut [f32],
    ) -> Result<()>
    where
        T: Copy + Into<f64> + Sync,
    {
        let labels = self.labels.as_ref().ok_or(CarvingError::UnpreprocessedState)?;
        if features.shape() != labels.shape() {
            return Err(CarvingError::shape_mismatch(labels.shape(), features.shape()));
        }
        if out.len() != self.edge_num() {
            return Err(CarvingError::shape_mismatch(self.edge_num(), out.len()));
        }

        let label_data = labels.data();
        let feature_data = features.data();
        let edge_lookup = self.edge_lookup();

        let partials: Vec<FxHashMap<EdgeId, Accumulator>> = (0..labels.shape()[0])
            .into_par_iter()
            .map(|slab| {
                let mut partial: FxHashMap<EdgeId, Accumulator> = FxHashMap::default();
                labels.for_each_forward_pair(slab..slab + 1, |i, j| {
                    let (a, b) = (label_data[i].node_id(), label_data[j].node_id());
                    if a == b {
                        return;
                    }
                    if let Some(&edge_id) = edge_lookup.get(&canonical(a, b)) {
                        let (fi, fj): (f64, f64) = (feature_data[i].into(), feature_data[j].into());
                        let sample = (fi + fj) * 0.5;
                        partial
                            .entry(edge_id)
                            .or_insert_with(Accumulator::new)
                            .push(sample);
                    }
                });
                partial
            })
            .collect();

        let mut totals = vec![Accumulator::new(); self.edge_num()];
        for partial in &partials {
            for (&edge_id, acc) in partial {
                totals[edge_id as usize].merge(acc);
            }
        }

        for (slot, acc) in out.iter_mut().zip(&totals) {
            *slot = acc.finish(aggregation);
        }
        Ok(())
    }
}

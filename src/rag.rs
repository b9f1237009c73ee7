use bit_vec::BitVec;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{CarvingError, Result};
use crate::grid::Grid;
use crate::traits::Label;
use crate::types::{canonical, Edge, EdgeId, NodeId};
use crate::utils::is_strictly_ascending;

const HEADER_LEN: usize = 3;
const PRESENCE_CHUNK: usize = 1 << 16;

/// Region adjacency graph over a labeled grid.
///
/// Every distinct label value is a node. Two nodes share an edge when some
/// pair of orthogonally adjacent voxels carries their two labels. Edges are
/// canonical `(u, v)` with `u < v` and are enumerated in ascending order of
/// that pair, so an edge id only depends on the edge set.
///
/// # Examples
///
/// ```ignore
/// let labels = Grid::from_vec([2, 3], vec![1u32, 1, 2, 1, 3, 2])?;
/// let mut rag = GridRag::new();
/// rag.assign_labels(labels);
/// assert_eq!(rag.edges(), &[(1, 2), (1, 3), (2, 3)]);
/// ```
#[derive(Debug, Clone)]
pub struct GridRag<const D: usize, L = u32> {
    pub(crate) labels: Option<Grid<L, D>>,
    max_label: Option<NodeId>,
    node_ids: Vec<NodeId>,
    max_node_id: Option<NodeId>,
    edges: Vec<Edge>,
    edge_lookup: FxHashMap<Edge, EdgeId>,
    adjacency: Vec<Vec<(NodeId, EdgeId)>>,
}

/// Topology decoded from its flat form, not yet applied to a graph.
struct Topology {
    node_ids: Vec<NodeId>,
    max_node_id: Option<NodeId>,
    edges: Vec<Edge>,
}

impl<const D: usize, L> Default for GridRag<D, L> {
    fn default() -> Self {
        Self {
            labels: None,
            max_label: None,
            node_ids: Vec::new(),
            max_node_id: None,
            edges: Vec::new(),
            edge_lookup: FxHashMap::default(),
            adjacency: Vec::new(),
        }
    }
}

impl<const D: usize, L: Label> GridRag<D, L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Builds the node and edge sets from `labels` and keeps the grid for
    /// later voxel-level queries.
    pub fn assign_labels(&mut self, labels: Grid<L, D>) {
        let max_label = labels.data().par_iter().map(|l| l.node_id()).max();
        let node_ids = match max_label {
            Some(max) => present_labels(labels.data(), max),
            None => Vec::new(),
        };
        let edges = discover_edges(&labels);

        debug!(
            nodes = node_ids.len(),
            edges = edges.len(),
            "discovered region adjacency"
        );

        self.apply(Topology {
            node_ids,
            max_node_id: max_label,
            edges,
        });
        self.labels = Some(labels);
        self.max_label = max_label;
    }

    /// Restores the edge set from `serialization` instead of scanning `labels`
    /// for adjacencies. The grid is still kept for voxel-level queries.
    pub fn assign_labels_from_serialization(
        &mut self,
        labels: Grid<L, D>,
        serialization: &[u32],
    ) -> Result<()> {
        let topology = Topology::decode(serialization)?;
        let max_label = labels.data().par_iter().map(|l| l.node_id()).max();
        check_labels_fit(max_label, topology.max_node_id)?;

        self.apply(topology);
        self.labels = Some(labels);
        self.max_label = max_label;
        Ok(())
    }

    /// Number of `u32` words [`serialize`](Self::serialize) produces.
    pub fn serialization_size(&self) -> usize {
        HEADER_LEN + self.node_ids.len() + 2 * self.edges.len()
    }

    /// Flat encoding of the topology:
    /// `[node_num, edge_num, max_node_id, node ids.., u0, v0, u1, v1, ..]`.
    pub fn serialize(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.serialization_size());
        out.push(self.node_ids.len() as u32);
        out.push(self.edges.len() as u32);
        out.push(self.max_node_id.unwrap_or(0));
        out.extend_from_slice(&self.node_ids);
        for &(u, v) in &self.edges {
            out.push(u);
            out.push(v);
        }
        out
    }

    /// Replaces the topology with a serialized one. The retained label grid,
    /// if any, must not contain labels beyond the restored max node id.
    pub fn deserialize(&mut self, serialization: &[u32]) -> Result<()> {
        let topology = Topology::decode(serialization)?;
        if self.labels.is_some() {
            check_labels_fit(self.max_label, topology.max_node_id)?;
        }
        self.apply(topology);
        Ok(())
    }

    pub fn labels(&self) -> Option<&Grid<L, D>> {
        self.labels.as_ref()
    }

    pub fn node_num(&self) -> usize {
        self.node_ids.len()
    }

    pub fn edge_num(&self) -> usize {
        self.edges.len()
    }

    pub fn max_node_id(&self) -> Option<NodeId> {
        self.max_node_id
    }

    pub fn max_edge_id(&self) -> Option<EdgeId> {
        self.edges.len().checked_sub(1).map(|id| id as EdgeId)
    }

    /// Length of dense per-node arrays: `max_node_id + 1`, or 0 for an empty graph.
    pub fn node_slots(&self) -> usize {
        self.max_node_id.map_or(0, |max| max as usize + 1)
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.node_ids.binary_search(&id).is_ok()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Id of the edge between `a` and `b`, in either order.
    pub fn edge_id(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.edge_lookup.get(&canonical(a, b)).copied()
    }

    /// Neighbors of `id` with the connecting edge ids, ascending by neighbor.
    pub fn neighbors(&self, id: NodeId) -> &[(NodeId, EdgeId)] {
        self.adjacency
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn edge_lookup(&self) -> &FxHashMap<Edge, EdgeId> {
        &self.edge_lookup
    }

    fn apply(&mut self, topology: Topology) {
        let slots = topology.max_node_id.map_or(0, |max| max as usize + 1);
        let mut edge_lookup = FxHashMap::default();
        edge_lookup.reserve(topology.edges.len());
        let mut adjacency = vec![Vec::new(); slots];

        // Edges arrive sorted, which keeps every adjacency list sorted too.
        for (edge_id, &(u, v)) in topology.edges.iter().enumerate() {
            let edge_id = edge_id as EdgeId;
            edge_lookup.insert((u, v), edge_id);
            adjacency[u as usize].push((v, edge_id));
            adjacency[v as usize].push((u, edge_id));
        }

        self.node_ids = topology.node_ids;
        self.max_node_id = topology.max_node_id;
        self.edges = topology.edges;
        self.edge_lookup = edge_lookup;
        self.adjacency = adjacency;
    }
}

impl Topology {
    fn decode(data: &[u32]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(CarvingError::serialization_format(format!(
                "expected a {HEADER_LEN}-word header, got {} words",
                data.len()
            )));
        }
        let node_num = data[0] as usize;
        let edge_num = data[1] as usize;
        let declared_max = data[2];

        let expected = edge_num
            .checked_mul(2)
            .and_then(|n| n.checked_add(node_num))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| CarvingError::serialization_format("declared counts overflow"))?;
        if data.len() != expected {
            return Err(CarvingError::serialization_format(format!(
                "{node_num} nodes and {edge_num} edges need {expected} words, got {}",
                data.len()
            )));
        }

        let node_ids = data[HEADER_LEN..HEADER_LEN + node_num].to_vec();
        if !is_strictly_ascending(&node_ids) {
            return Err(CarvingError::serialization_format(
                "node ids are not strictly ascending",
            ));
        }

        let max_node_id = match node_ids.last() {
            Some(&last) if last == declared_max => Some(last),
            Some(&last) => {
                return Err(CarvingError::serialization_format(format!(
                    "declared max node id {declared_max} but the largest node is {last}"
                )))
            }
            None if declared_max == 0 && edge_num == 0 => None,
            None => {
                return Err(CarvingError::serialization_format(
                    "a graph without nodes cannot declare edges or a max node id",
                ))
            }
        };

        let edges: Vec<Edge> = data[HEADER_LEN + node_num..]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        for &(u, v) in &edges {
            if u >= v {
                return Err(CarvingError::serialization_format(format!(
                    "edge ({u}, {v}) is not canonical"
                )));
            }
            if node_ids.binary_search(&u).is_err() || node_ids.binary_search(&v).is_err() {
                return Err(CarvingError::serialization_format(format!(
                    "edge ({u}, {v}) references a node outside the node set"
                )));
            }
        }
        if !is_strictly_ascending(&edges) {
            return Err(CarvingError::serialization_format(
                "edges are not strictly ascending",
            ));
        }

        Ok(Self {
            node_ids,
            max_node_id,
            edges,
        })
    }
}

fn check_labels_fit(max_label: Option<NodeId>, max_node_id: Option<NodeId>) -> Result<()> {
    match (max_label, max_node_id) {
        (Some(label), Some(max)) if label > max => Err(CarvingError::serialization_format(
            format!("label {label} exceeds the serialized max node id {max}"),
        )),
        (Some(label), None) => Err(CarvingError::serialization_format(format!(
            "label {label} present but the serialized graph has no nodes"
        ))),
        _ => Ok(()),
    }
}

/// Ascending ids of the labels occurring in `data`. One presence bitmap is
/// kept per rayon fold job, not per chunk.
fn present_labels<L: Label>(data: &[L], max_label: NodeId) -> Vec<NodeId> {
    let slots = max_label as usize + 1;
    let presence = data
        .par_chunks(PRESENCE_CHUNK)
        .fold(
            || BitVec::from_elem(slots, false),
            |mut bit_vec, chunk| {
                for label in chunk {
                    bit_vec.set(label.node_id() as usize, true);
                }
                bit_vec
            },
        )
        .reduce_with(|mut acc, x| {
            acc.or(&x);
            acc
        })
        .unwrap_or_else(|| BitVec::from_elem(slots, false));

    presence
        .iter()
        .enumerate()
        .filter_map(|(id, present)| present.then_some(id as NodeId))
        .collect()
}

/// Collects every canonical edge of `labels`. Axis-0 slabs are scanned in
/// parallel and merged by set union, then sorted into enumeration order.
fn discover_edges<const D: usize, L: Label>(labels: &Grid<L, D>) -> Vec<Edge> {
    let data = labels.data();
    let slabs = labels.shape()[0];

    let edge_set = (0..slabs)
        .into_par_iter()
        .fold(FxHashSet::default, |mut set, slab| {
            labels.for_each_forward_pair(slab..slab + 1, |i, j| {
                let (a, b) = (data[i].node_id(), data[j].node_id());
                if a != b {
                    set.insert(canonical(a, b));
                }
            });
            set
        })
        .reduce(FxHashSet::default, |mut acc, set| {
            if acc.len() < set.len() {
                return set.into_iter().chain(acc).collect();
            }
            acc.extend(set);
            acc
        });

    let mut edges: Vec<Edge> = edge_set.into_iter().collect();
    edges.par_sort_unstable();
    edges
}

use std::collections::VecDeque;

use crate::error::{CarvingError, Result};
use crate::traits::{Cut, CutSolver};
use crate::types::{Edge, Seed};

const UNREACHED: usize = usize::MAX;

/// Seeded s-t minimum cut via Dinic's max-flow algorithm.
///
/// Each undirected edge becomes a pair of opposite arcs carrying the edge
/// weight as capacity. Foreground seeds hang off the source and background
/// seeds off the sink with unbounded capacity. After the max flow, the
/// foreground is the set of nodes still reachable from the source in the
/// residual network: the smallest source side among all minimum cuts, so
/// equal-cost alternatives go to background.
#[derive(Debug, Clone, Copy, Default)]
pub struct DinicSolver;

impl CutSolver for DinicSolver {
    fn solve(
        &self,
        node_count: usize,
        edges: &[Edge],
        weights: &[f32],
        seeds: &[Seed],
    ) -> Result<Cut> {
        if weights.len() != edges.len() {
            return Err(CarvingError::shape_mismatch(edges.len(), weights.len()));
        }
        if seeds.len() != node_count {
            return Err(CarvingError::shape_mismatch(node_count, seeds.len()));
        }

        if !seeds.contains(&Seed::Foreground) {
            return Ok(Cut {
                foreground: vec![false; node_count],
                value: 0.0,
            });
        }

        let source = node_count;
        let sink = node_count + 1;
        let mut network = FlowNetwork::with_vertices(node_count + 2);

        for (&(u, v), &weight) in edges.iter().zip(weights) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CarvingError::solver_failure(format!(
                    "edge ({u}, {v}) has weight {weight}; capacities must be finite and >= 0"
                )));
            }
            let (u, v) = (u as usize, v as usize);
            if u >= node_count || v >= node_count {
                return Err(CarvingError::solver_failure(format!(
                    "edge ({u}, {v}) references a node beyond {node_count} slots"
                )));
            }
            if weight > 0.0 {
                network.add_arc_pair(u, v, weight as f64, weight as f64);
            }
        }

        for (node, seed) in seeds.iter().enumerate() {
            match seed {
                Seed::Foreground => network.add_arc_pair(source, node, f64::INFINITY, 0.0),
                Seed::Background => network.add_arc_pair(node, sink, f64::INFINITY, 0.0),
                Seed::Unseeded => {}
            }
        }

        let value = network.max_flow(source, sink)?;
        let mut foreground = network.reachable_from(source);
        foreground.truncate(node_count);

        Ok(Cut { foreground, value })
    }
}

/// Residual network with arcs stored in pairs: arc `a ^ 1` is the reverse of `a`.
struct FlowNetwork {
    head: Vec<Vec<usize>>,
    to: Vec<usize>,
    cap: Vec<f64>,
}

impl FlowNetwork {
    fn with_vertices(n: usize) -> Self {
        Self {
            head: vec![Vec::new(); n],
            to: Vec::new(),
            cap: Vec::new(),
        }
    }

    fn add_arc_pair(&mut self, u: usize, v: usize, cap_uv: f64, cap_vu: f64) {
        let a = self.to.len();
        self.to.push(v);
        self.cap.push(cap_uv);
        self.head[u].push(a);
        self.to.push(u);
        self.cap.push(cap_vu);
        self.head[v].push(a + 1);
    }

    /// BFS distances from `s` over arcs with residual capacity.
    fn levels(&self, s: usize) -> Vec<usize> {
        let mut level = vec![UNREACHED; self.head.len()];
        let mut queue = VecDeque::new();
        level[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            for &a in &self.head[v] {
                let w = self.to[a];
                if self.cap[a] > 0.0 && level[w] == UNREACHED {
                    level[w] = level[v] + 1;
                    queue.push_back(w);
                }
            }
        }
        level
    }

    fn reachable_from(&self, s: usize) -> Vec<bool> {
        self.levels(s).into_iter().map(|l| l != UNREACHED).collect()
    }

    fn max_flow(&mut self, s: usize, t: usize) -> Result<f64> {
        let mut total = 0.0;
        loop {
            let mut level = self.levels(s);
            if level[t] == UNREACHED {
                return Ok(total);
            }
            total += self.blocking_flow(s, t, &mut level)?;
        }
    }

    /// Saturates every shortest augmenting path of the current level graph.
    fn blocking_flow(&mut self, s: usize, t: usize, level: &mut [usize]) -> Result<f64> {
        let mut next = vec![0usize; self.head.len()];
        let mut path: Vec<usize> = Vec::new();
        let mut total = 0.0;
        let mut v = s;

        loop {
            if v == t {
                let pushed = path
                    .iter()
                    .map(|&a| self.cap[a])
                    .fold(f64::INFINITY, f64::min);
                if !pushed.is_finite() {
                    return Err(CarvingError::solver_failure(
                        "unbounded augmenting path between foreground and background seeds",
                    ));
                }
                for &a in &path {
                    self.cap[a] -= pushed;
                    self.cap[a ^ 1] += pushed;
                }
                total += pushed;

                // resume from the tail of the first saturated arc
                let first = path.iter().position(|&a| self.cap[a] <= 0.0).unwrap_or(0);
                path.truncate(first);
                v = match path.last() {
                    Some(&a) => self.to[a],
                    None => s,
                };
                continue;
            }

            let mut advanced = false;
            while next[v] < self.head[v].len() {
                let a = self.head[v][next[v]];
                let w = self.to[a];
                if self.cap[a] > 0.0 && level[w] != UNREACHED && level[w] == level[v] + 1 {
                    path.push(a);
                    v = w;
                    advanced = true;
                    break;
                }
                next[v] += 1;
            }

            if !advanced {
                // dead end: drop v from the level graph and retreat
                level[v] = UNREACHED;
                let Some(a) = path.pop() else {
                    return Ok(total);
                };
                v = self.to[a ^ 1];
                next[v] += 1;
            }
        }
    }
}

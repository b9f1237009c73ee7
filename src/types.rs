use serde::{Deserialize, Serialize};

use crate::error::{CarvingError, Result};

/// A supervoxel id. Equal to the label value of the region.
pub type NodeId = u32;

/// Position of an edge in the graph's enumeration order.
pub type EdgeId = u32;

/// Canonical edge `(u, v)` with `u < v`.
pub type Edge = (NodeId, NodeId);

pub fn canonical(a: NodeId, b: NodeId) -> Edge {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Per-node seed state. The discriminants are the values exchanged with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Seed {
    #[default]
    Unseeded = 0,
    Foreground = 1,
    Background = 2,
}

impl Seed {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Seed {
    type Error = CarvingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Seed::Unseeded),
            1 => Ok(Seed::Foreground),
            2 => Ok(Seed::Background),
            other => Err(CarvingError::invalid_seed(format!(
                "seed value {other} is not one of 0 (unseeded), 1 (foreground), 2 (background)"
            ))),
        }
    }
}

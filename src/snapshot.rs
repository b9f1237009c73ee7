use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{CarvingError, Result};

/// Full state of a carving session, as separately exposed pieces.
///
/// `node_seeds` holds 0 (unseeded), 1 (foreground) or 2 (background) per
/// node slot; `result` holds 1 for foreground and 0 for background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub topology: Vec<u32>,
    pub edge_weights: Vec<f32>,
    pub node_seeds: Vec<u8>,
    pub result: Vec<u8>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Writes a serialized topology as a little-endian word count followed by the words.
pub fn write_topology<W: Write>(mut writer: W, topology: &[u32]) -> Result<()> {
    writer.write_u64::<LittleEndian>(topology.len() as u64)?;
    for &word in topology {
        writer.write_u32::<LittleEndian>(word)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_topology<R: Read>(mut reader: R) -> Result<Vec<u32>> {
    let len = reader.read_u64::<LittleEndian>()?;
    let len = usize::try_from(len).map_err(|_| {
        CarvingError::serialization_format(format!("topology length {len} is not addressable"))
    })?;

    let mut topology = Vec::with_capacity(len.min(1 << 20));
    for _ in 0..len {
        topology.push(reader.read_u32::<LittleEndian>()?);
    }
    Ok(topology)
}

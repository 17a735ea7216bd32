//! The VDI descriptor carried inside VDI objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk descriptor of a VDI.
///
/// The descriptor is bincode-encoded at the start of the VDI object; the
/// remainder of the object is zero padding and is ignored on decode. The
/// `data_vdi_id` map is the sparse extent map from data-slot index to the
/// vid owning that slot; an absent key means the slot has no data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdiInode {
    /// VDI name, unique in the cluster namespace.
    pub name: String,
    /// Logical volume size in bytes.
    pub vdi_size: u64,
    /// The vid this descriptor belongs to.
    pub vdi_id: u32,
    /// Snapshot generation; the working VDI of a family has the largest one.
    pub snap_id: u32,
    /// Replica count for the VDI's objects.
    pub nr_copies: u8,
    /// Replication policy (0 = full copies).
    pub copy_policy: u8,
    /// Placement policy (1 = hash placement for hyper volumes).
    pub store_policy: u8,
    /// Sparse extent map: data-slot index -> owning vid.
    pub data_vdi_id: BTreeMap<u32, u32>,
}

impl VdiInode {
    /// Returns the vid owning data slot `idx`, or 0 if the slot is empty.
    #[must_use]
    pub fn get_vid(&self, idx: u32) -> u32 {
        self.data_vdi_id.get(&idx).copied().unwrap_or(0)
    }

    /// Sets (or clears, when `vid == 0`) the owner of data slot `idx`.
    pub fn set_vid(&mut self, idx: u32, vid: u32) {
        if vid == 0 {
            self.data_vdi_id.remove(&idx);
        } else {
            self.data_vdi_id.insert(idx, vid);
        }
    }

    /// Iterates the occupied extents in slot order.
    pub fn extents(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.data_vdi_id.iter().map(|(&idx, &vid)| (idx, vid))
    }

    /// Encodes the descriptor for storage inside a VDI object.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a descriptor from the front of a VDI object's payload.
    ///
    /// Trailing padding after the encoded form is ignored.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be decoded.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(buf)?)
    }
}

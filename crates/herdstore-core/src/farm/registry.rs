//! Restore-time VDI registry.
//!
//! While a snapshot load streams objects back into the cluster, every VDI
//! descriptor that passes through is recorded here keyed by name. After the
//! stream drains, `commit` re-creates one active VDI per name: the version
//! with the largest `snap_id`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::store::inode::VdiInode;
use crate::store::traits::{BlockStore, VdiCreateParams};

/// Identifying fields of the most recent descriptor seen for one VDI name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdiEntry {
    /// VDI name.
    pub name: String,
    /// Logical size in bytes.
    pub vdi_size: u64,
    /// vid of the recorded descriptor.
    pub vdi_id: u32,
    /// Snapshot generation of the recorded descriptor.
    pub snap_id: u32,
    /// Replica count.
    pub nr_copies: u8,
    /// Replication policy.
    pub copy_policy: u8,
    /// Placement policy.
    pub store_policy: u8,
}

impl From<&VdiInode> for VdiEntry {
    fn from(inode: &VdiInode) -> Self {
        Self {
            name: inode.name.clone(),
            vdi_size: inode.vdi_size,
            vdi_id: inode.vdi_id,
            snap_id: inode.snap_id,
            nr_copies: inode.nr_copies,
            copy_policy: inode.copy_policy,
            store_policy: inode.store_policy,
        }
    }
}

/// Ordered name -> latest-descriptor mapping.
///
/// Ordering is only used for deterministic iteration at commit time.
#[derive(Debug, Default)]
pub struct VdiRegistry {
    entries: BTreeMap<String, VdiEntry>,
}

impl VdiRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `inode`, keeping the entry with the largest `snap_id` per
    /// name.
    pub fn insert(&mut self, inode: &VdiInode) {
        match self.entries.get_mut(&inode.name) {
            None => {
                self.entries
                    .insert(inode.name.clone(), VdiEntry::from(inode));
            }
            Some(entry) if entry.snap_id < inode.snap_id => {
                *entry = VdiEntry::from(inode);
            }
            Some(_) => {}
        }
    }

    /// Looks up the recorded entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VdiEntry> {
        self.entries.get(name)
    }

    /// Number of distinct names recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-creates the active VDI for every recorded name, in name order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first creation failure.
    pub fn commit(&self, store: &dyn BlockStore) -> Result<()> {
        for entry in self.entries.values() {
            let new_vid = store.vdi_create(&VdiCreateParams {
                name: entry.name.clone(),
                size: entry.vdi_size,
                base_vid: entry.vdi_id,
                snapshot: false,
                nr_copies: entry.nr_copies,
                copy_policy: entry.copy_policy,
                store_policy: entry.store_policy,
            })?;
            debug!(name = %entry.name, new_vid, snap_id = entry.snap_id, "recreated vdi");
        }
        Ok(())
    }

    /// Releases all recorded entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

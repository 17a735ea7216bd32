//! In-memory block store.
//!
//! A process-local [`BlockStore`] keeping objects in maps. It backs the test
//! suite and serves as the reference for the trait's semantics: fixed object
//! sizes, zero-filled sparse reads, and a flat name -> vid namespace.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::geometry::{get_objsize, oid_to_vid, vid_to_vdi_oid, MAX_VDI_NAME};
use crate::store::inode::VdiInode;
use crate::store::traits::{BlockStore, ObjectRef, VdiCreateParams, WriteOptions};

struct ObjectBuf {
    data: Vec<u8>,
    nr_copies: u8,
    copy_policy: u8,
}

/// In-memory reference implementation of [`BlockStore`].
pub struct MemStore {
    objects: RwLock<FxHashMap<u64, ObjectBuf>>,
    vdis: RwLock<BTreeMap<String, u32>>,
    next_vid: RwLock<u32>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(FxHashMap::default()),
            vdis: RwLock::new(BTreeMap::new()),
            next_vid: RwLock::new(1),
        }
    }

    fn check_range(oid: u64, offset: u64, len: usize) -> Result<()> {
        let objsize = get_objsize(oid) as u64;
        if len as u64 > objsize || offset > objsize - len as u64 {
            return Err(Error::Internal(format!(
                "access beyond object {oid:#018x}: offset {offset} + len {len} > {objsize}"
            )));
        }
        Ok(())
    }

    fn alloc_vid(&self) -> u32 {
        let mut next = self.next_vid.write();
        let vid = *next;
        *next += 1;
        vid
    }
}

impl BlockStore for MemStore {
    fn read_object(&self, oid: u64, buf: &mut [u8], offset: u64) -> Result<()> {
        Self::check_range(oid, offset, buf.len())?;
        let objects = self.objects.read();
        let obj = objects.get(&oid).ok_or(Error::NoObject(oid))?;

        #[allow(clippy::cast_possible_truncation)] // bounded by objsize above
        let offset = offset as usize;
        let avail = obj.data.len().saturating_sub(offset);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&obj.data[offset..offset + n]);
        buf[n..].fill(0);
        Ok(())
    }

    fn write_object(&self, oid: u64, buf: &[u8], offset: u64, opts: &WriteOptions) -> Result<()> {
        Self::check_range(oid, offset, buf.len())?;
        let mut objects = self.objects.write();
        if !opts.create && !objects.contains_key(&oid) {
            return Err(Error::NoObject(oid));
        }
        let obj = objects.entry(oid).or_insert_with(|| ObjectBuf {
            data: Vec::new(),
            nr_copies: opts.nr_copies,
            copy_policy: opts.copy_policy,
        });

        #[allow(clippy::cast_possible_truncation)] // bounded by objsize above
        let offset = offset as usize;
        let end = offset + buf.len();
        if obj.data.len() < end {
            obj.data.resize(end, 0);
        }
        obj.data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn discard_object(&self, oid: u64) -> Result<()> {
        self.objects
            .write()
            .remove(&oid)
            .map(|_| ())
            .ok_or(Error::NoObject(oid))
    }

    fn vdi_lookup(&self, name: &str) -> Result<u32> {
        self.vdis
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| Error::NoVdi(name.to_string()))
    }

    fn vdi_create(&self, params: &VdiCreateParams) -> Result<u32> {
        if params.name.is_empty() || params.name.len() >= MAX_VDI_NAME {
            return Err(Error::InvalidName(params.name.clone()));
        }
        let mut vdis = self.vdis.write();
        if vdis.contains_key(&params.name) {
            return Err(Error::VdiExists(params.name.clone()));
        }
        let vid = self.alloc_vid();
        let inode = VdiInode {
            name: params.name.clone(),
            vdi_size: params.size,
            vdi_id: vid,
            snap_id: 0,
            nr_copies: params.nr_copies,
            copy_policy: params.copy_policy,
            store_policy: params.store_policy,
            data_vdi_id: BTreeMap::new(),
        };
        let encoded = inode.encode()?;
        self.objects.write().insert(
            vid_to_vdi_oid(vid),
            ObjectBuf {
                data: encoded,
                nr_copies: params.nr_copies,
                copy_policy: params.copy_policy,
            },
        );
        vdis.insert(params.name.clone(), vid);
        debug!(name = %params.name, vid, "created vdi");
        Ok(vid)
    }

    fn vdi_delete(&self, name: &str) -> Result<()> {
        let mut vdis = self.vdis.write();
        let vid = vdis
            .remove(name)
            .ok_or_else(|| Error::NoVdi(name.to_string()))?;
        self.objects
            .write()
            .retain(|&oid, _| oid_to_vid(oid) != vid);
        debug!(name, vid, "deleted vdi");
        Ok(())
    }

    fn notify_vdi_add(
        &self,
        vid: u32,
        nr_copies: u8,
        copy_policy: u8,
        set_bitmap: bool,
    ) -> Result<()> {
        debug!(vid, nr_copies, copy_policy, set_bitmap, "vdi add notified");
        Ok(())
    }

    fn inode_read(&self, vid: u32) -> Result<VdiInode> {
        let oid = vid_to_vdi_oid(vid);
        let objects = self.objects.read();
        let obj = objects.get(&oid).ok_or(Error::NoObject(oid))?;
        VdiInode::decode(&obj.data)
    }

    fn inode_write_vid(
        &self,
        inode: &VdiInode,
        data_index: u32,
        _base_vid: u32,
        _cur_vid: u32,
    ) -> Result<()> {
        let oid = vid_to_vdi_oid(inode.vdi_id);
        let mut stored = {
            let objects = self.objects.read();
            let obj = objects.get(&oid).ok_or(Error::NoObject(oid))?;
            VdiInode::decode(&obj.data)?
        };
        stored.set_vid(data_index, inode.get_vid(data_index));
        let encoded = stored.encode()?;
        let mut objects = self.objects.write();
        let obj = objects.get_mut(&oid).ok_or(Error::NoObject(oid))?;
        obj.data = encoded;
        Ok(())
    }

    fn object_refs(&self) -> Vec<ObjectRef> {
        let objects = self.objects.read();
        let mut refs: Vec<ObjectRef> = objects
            .iter()
            .map(|(&oid, obj)| ObjectRef {
                oid,
                nr_copies: obj.nr_copies,
                copy_policy: obj.copy_policy,
            })
            .collect();
        refs.sort_unstable_by_key(|r| r.oid);
        refs
    }

    fn object_count(&self) -> u64 {
        self.objects.read().len() as u64
    }
}

//! The block-store trait consumed by the farm and kv engines.

use crate::error::Result;
use crate::store::inode::VdiInode;

/// One object as enumerated for a snapshot save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    /// Object identifier.
    pub oid: u64,
    /// Replica count of the object.
    pub nr_copies: u8,
    /// Replication policy of the object.
    pub copy_policy: u8,
}

/// Options for an object write.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Create the object if it does not exist (and overwrite if it does).
    pub create: bool,
    /// Replica count recorded on creation.
    pub nr_copies: u8,
    /// Replication policy recorded on creation.
    pub copy_policy: u8,
}

impl WriteOptions {
    /// Options for creating (or re-creating) an object.
    #[must_use]
    pub const fn create(nr_copies: u8, copy_policy: u8) -> Self {
        Self {
            create: true,
            nr_copies,
            copy_policy,
        }
    }

    /// Options for updating an existing object in place.
    #[must_use]
    pub const fn overwrite() -> Self {
        Self {
            create: false,
            nr_copies: 0,
            copy_policy: 0,
        }
    }
}

/// Parameters for VDI creation.
#[derive(Debug, Clone)]
pub struct VdiCreateParams {
    /// VDI name.
    pub name: String,
    /// Logical size in bytes.
    pub size: u64,
    /// Base vid this VDI descends from (0 for none).
    pub base_vid: u32,
    /// Create as a snapshot of the base rather than a working VDI.
    pub snapshot: bool,
    /// Replica count.
    pub nr_copies: u8,
    /// Replication policy.
    pub copy_policy: u8,
    /// Placement policy (1 = hash placement, used by hyper volumes).
    pub store_policy: u8,
}

/// The replicated block store, as seen by this crate.
///
/// Implementations route these calls over the cluster RPC transport; the
/// in-memory [`MemStore`](crate::store::MemStore) backs the test suite.
/// Object reads past the written extent of an existing object yield zeros,
/// mirroring the sparse-object semantics of the real store.
pub trait BlockStore: Send + Sync {
    /// Reads `buf.len()` bytes at `offset` from `oid` into `buf`.
    ///
    /// # Errors
    ///
    /// `NoObject` if the object does not exist; an error if the read would
    /// exceed the object's fixed size.
    fn read_object(&self, oid: u64, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes `buf` at `offset` into `oid`.
    ///
    /// # Errors
    ///
    /// `NoObject` when updating an object that does not exist without
    /// `opts.create`; an error if the write would exceed the object's
    /// fixed size.
    fn write_object(&self, oid: u64, buf: &[u8], offset: u64, opts: &WriteOptions) -> Result<()>;

    /// Removes an object from the store.
    ///
    /// # Errors
    ///
    /// `NoObject` if the object does not exist.
    fn discard_object(&self, oid: u64) -> Result<()>;

    /// Resolves a VDI name to its current vid.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the name is not registered.
    fn vdi_lookup(&self, name: &str) -> Result<u32>;

    /// Creates a VDI and its descriptor object, returning the new vid.
    ///
    /// # Errors
    ///
    /// `VdiExists` if the name is already registered.
    fn vdi_create(&self, params: &VdiCreateParams) -> Result<u32>;

    /// Deletes a VDI, its descriptor object and its data objects.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the name is not registered.
    fn vdi_delete(&self, name: &str) -> Result<()>;

    /// Announces a restored VDI to the cluster's vid bitmap.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be delivered.
    fn notify_vdi_add(&self, vid: u32, nr_copies: u8, copy_policy: u8, set_bitmap: bool)
        -> Result<()>;

    /// Reads and decodes the descriptor of `vid`.
    ///
    /// # Errors
    ///
    /// `NoObject` if the descriptor object does not exist.
    fn inode_read(&self, vid: u32) -> Result<VdiInode>;

    /// Persists one extent-map slot of `inode` with the store's B-tree
    /// write semantics.
    ///
    /// The caller has already updated `inode` in memory; `base_vid` and
    /// `cur_vid` identify the extent generation being replaced.
    ///
    /// # Errors
    ///
    /// `NoObject` if the descriptor object does not exist.
    fn inode_write_vid(
        &self,
        inode: &VdiInode,
        data_index: u32,
        base_vid: u32,
        cur_vid: u32,
    ) -> Result<()>;

    /// Enumerates every object currently in the store, in oid order.
    fn object_refs(&self) -> Vec<ObjectRef>;

    /// Number of objects currently in the store.
    fn object_count(&self) -> u64;
}

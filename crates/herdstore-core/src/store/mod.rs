//! The block-store boundary.
//!
//! The replicated block store itself lives outside this crate; what lives
//! here is everything both sides must agree on:
//!
//! - [`geometry`]: the 64-bit object address space and size constants
//! - [`inode`]: the [`VdiInode`] descriptor carried inside VDI objects
//! - [`traits`]: the [`BlockStore`] trait consumed by the farm and kv engines
//! - [`mem`]: [`MemStore`], an in-memory reference implementation

pub mod geometry;
pub mod inode;
pub mod mem;
pub mod traits;

pub use geometry::{
    get_objsize, is_vdi_obj, oid_to_data_idx, oid_to_vid, vid_to_data_oid, vid_to_vdi_oid,
    DATA_OBJ_SIZE, INODE_OBJ_SIZE, MAX_DATA_OBJS, MAX_VDI_NAME, MAX_VDI_SIZE,
};
pub use inode::VdiInode;
pub use mem::MemStore;
pub use traits::{BlockStore, ObjectRef, VdiCreateParams, WriteOptions};

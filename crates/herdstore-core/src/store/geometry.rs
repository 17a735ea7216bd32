//! Object address-space geometry.
//!
//! Every object in the block store is addressed by a 64-bit oid. A VDI's
//! descriptor object carries the VDI bit; its data objects encode the owning
//! vid in the high half and the data-slot index in the low half:
//!
//! ```text
//! vdi object:  [1][ vid (31) ][ 0          (32) ]
//! data object: [0][ vid (31) ][ data index (32) ]
//! ```

/// Size of one data object.
pub const DATA_OBJ_SIZE: usize = 4 << 20;

/// Size of one VDI descriptor object.
pub const INODE_OBJ_SIZE: usize = 8 << 20;

/// Number of data-object slots per VDI.
pub const MAX_DATA_OBJS: u64 = 1 << 20;

/// Maximum logical size of a VDI.
pub const MAX_VDI_SIZE: u64 = DATA_OBJ_SIZE as u64 * MAX_DATA_OBJS;

/// Maximum VDI name length, including the implicit terminator slot.
pub const MAX_VDI_NAME: usize = 256;

/// Bit marking an oid as a VDI descriptor object.
pub const VDI_BIT: u64 = 1 << 63;

/// Shift separating the vid from the data-slot index inside an oid.
pub const VDI_SPACE_SHIFT: u32 = 32;

/// Returns the oid of the descriptor object of `vid`.
#[must_use]
pub const fn vid_to_vdi_oid(vid: u32) -> u64 {
    VDI_BIT | ((vid as u64) << VDI_SPACE_SHIFT)
}

/// Returns the oid of data slot `idx` of `vid`.
#[must_use]
pub const fn vid_to_data_oid(vid: u32, idx: u32) -> u64 {
    ((vid as u64) << VDI_SPACE_SHIFT) | idx as u64
}

/// True iff `oid` addresses a VDI descriptor object.
#[must_use]
pub const fn is_vdi_obj(oid: u64) -> bool {
    oid & VDI_BIT != 0
}

/// Extracts the owning vid from any oid.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // vid occupies bits 32..63
pub const fn oid_to_vid(oid: u64) -> u32 {
    ((oid & !VDI_BIT) >> VDI_SPACE_SHIFT) as u32
}

/// Extracts the data-slot index from a data oid.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // index occupies bits 0..32
pub const fn oid_to_data_idx(oid: u64) -> u32 {
    (oid & ((1 << VDI_SPACE_SHIFT) - 1)) as u32
}

/// Returns the fixed byte size of the object addressed by `oid`.
#[must_use]
pub const fn get_objsize(oid: u64) -> usize {
    if is_vdi_obj(oid) {
        INODE_OBJ_SIZE
    } else {
        DATA_OBJ_SIZE
    }
}

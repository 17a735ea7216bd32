//! Fixed-size binary records of the object-storage layout.
//!
//! Account VDIs hold [`BucketInode`] records; bucket VDIs hold one
//! [`OnodeHdr`] per data object, optionally followed by inline payload or
//! by [`OnodeExtent`] descriptors. All integers are little-endian, names
//! are NUL-padded, and padding is written as zeros and ignored on read.

use crate::error::{Error, Result};
use crate::store::geometry::DATA_OBJ_SIZE;

/// Maximum bucket name length, including the implicit terminator slot.
pub const MAX_BUCKET_NAME: usize = 64;

/// On-disk size of one bucket inode record.
pub const BUCKET_INODE_SIZE: usize = MAX_BUCKET_NAME * 2;

/// Bucket inode records per data object.
pub const BUCKETS_PER_OBJ: u64 = (DATA_OBJ_SIZE / BUCKET_INODE_SIZE) as u64;

/// Bucket slots in an account VDI.
pub const MAX_BUCKETS: u64 = crate::store::geometry::MAX_VDI_SIZE / BUCKET_INODE_SIZE as u64;

/// Maximum object name length, including the implicit terminator slot.
pub const MAX_OBJECT_NAME: usize = 1024;

/// On-disk size of an onode header: exactly one block.
pub const ONODE_HDR_SIZE: usize = 4096;

/// Etag field width (SHA-1 digest rounded up to 8 bytes).
pub const ETAG_SIZE: usize = 24;

/// On-disk size of one onode extent descriptor.
pub const ONODE_EXTENT_SIZE: usize = 24;

/// Largest payload stored inline behind the onode header.
pub const ONODE_INLINE_SIZE: usize = DATA_OBJ_SIZE - ONODE_HDR_SIZE;

// Layout checks: the record sizes above are wire format, not convention.
const _: () = assert!(BUCKET_INODE_SIZE == 128);
const _: () = assert!(MAX_BUCKET_NAME + 8 + 8 + 4 <= BUCKET_INODE_SIZE);
const _: () = assert!(MAX_OBJECT_NAME + ETAG_SIZE + 8 + 8 + 8 + 4 + 4 + 1 <= ONODE_HDR_SIZE);
const _: () = assert!(DATA_OBJ_SIZE % BUCKET_INODE_SIZE == 0);

fn decode_name(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(ToString::to_string)
        .map_err(|_| Error::Corrupt("non-UTF-8 name field".to_string()))
}

fn encode_name(out: &mut [u8], name: &str, max: usize) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() >= max || bytes.contains(&0) {
        return Err(Error::InvalidName(name.to_string()));
    }
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn read_array<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    out
}

/// One bucket record inside an account VDI.
///
/// `onode_vid == 0` marks an empty slot; the name of a freed slot is left
/// in place and carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInode {
    /// Bucket name.
    pub bucket_name: String,
    /// Objects stored in the bucket.
    pub obj_count: u64,
    /// Payload bytes stored in the bucket.
    pub bytes_used: u64,
    /// vid of the bucket's own VDI; 0 for an empty slot.
    pub onode_vid: u32,
}

impl BucketInode {
    /// True iff this slot holds no bucket.
    #[must_use]
    pub const fn is_empty_slot(&self) -> bool {
        self.onode_vid == 0
    }

    /// Encodes the record into its fixed wire form.
    ///
    /// # Errors
    ///
    /// `InvalidName` if the bucket name does not fit the name field.
    pub fn encode(&self) -> Result<[u8; BUCKET_INODE_SIZE]> {
        let mut out = [0u8; BUCKET_INODE_SIZE];
        encode_name(&mut out[..MAX_BUCKET_NAME], &self.bucket_name, MAX_BUCKET_NAME)?;
        out[64..72].copy_from_slice(&self.obj_count.to_le_bytes());
        out[72..80].copy_from_slice(&self.bytes_used.to_le_bytes());
        out[80..84].copy_from_slice(&self.onode_vid.to_le_bytes());
        Ok(out)
    }

    /// Decodes a record from its fixed wire form.
    ///
    /// # Errors
    ///
    /// `Corrupt` if the buffer is short or the name is not UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < BUCKET_INODE_SIZE {
            return Err(Error::Corrupt("short bucket inode record".to_string()));
        }
        Ok(Self {
            bucket_name: decode_name(&buf[..MAX_BUCKET_NAME])?,
            obj_count: u64::from_le_bytes(read_array(&buf[64..72])),
            bytes_used: u64::from_le_bytes(read_array(&buf[72..80])),
            onode_vid: u32::from_le_bytes(read_array(&buf[80..84])),
        })
    }
}

/// Per-object header stored at the front of a bucket data object.
///
/// When `inlined` is set the payload follows the header inside the same
/// data object; otherwise the body is `nr_extent` [`OnodeExtent`] records
/// referencing payload regions in the VDI named by `data_vid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnodeHdr {
    /// Object name; an empty name marks a deleted slot (tombstone).
    pub name: String,
    /// SHA-1 etag of the payload.
    pub sha1: [u8; 20],
    /// Payload size in bytes.
    pub size: u64,
    /// Creation time, `seconds << 32 | nanos`.
    pub ctime: u64,
    /// Modification time, `seconds << 32 | nanos`.
    pub mtime: u64,
    /// Payload VDI for extent-based objects; 0 when inlined.
    pub data_vid: u32,
    /// Number of extent records; 0 when inlined.
    pub nr_extent: u32,
    /// Payload follows the header inside the same data object.
    pub inlined: bool,
}

impl OnodeHdr {
    /// True iff this header marks a deleted slot.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.name.is_empty()
    }

    /// Encodes the header into one block.
    ///
    /// # Errors
    ///
    /// `InvalidName` if the object name does not fit the name field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; ONODE_HDR_SIZE];
        encode_name(&mut out[..MAX_OBJECT_NAME], &self.name, MAX_OBJECT_NAME)?;
        out[1024..1044].copy_from_slice(&self.sha1);
        out[1048..1056].copy_from_slice(&self.size.to_le_bytes());
        out[1056..1064].copy_from_slice(&self.ctime.to_le_bytes());
        out[1064..1072].copy_from_slice(&self.mtime.to_le_bytes());
        out[1072..1076].copy_from_slice(&self.data_vid.to_le_bytes());
        out[1076..1080].copy_from_slice(&self.nr_extent.to_le_bytes());
        out[1080] = u8::from(self.inlined);
        Ok(out)
    }

    /// Decodes a header from one block.
    ///
    /// # Errors
    ///
    /// `Corrupt` if the buffer is short or the name is not UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ONODE_HDR_SIZE {
            return Err(Error::Corrupt("short onode header".to_string()));
        }
        Ok(Self {
            name: decode_name(&buf[..MAX_OBJECT_NAME])?,
            sha1: read_array(&buf[1024..1044]),
            size: u64::from_le_bytes(read_array(&buf[1048..1056])),
            ctime: u64::from_le_bytes(read_array(&buf[1056..1064])),
            mtime: u64::from_le_bytes(read_array(&buf[1064..1072])),
            data_vid: u32::from_le_bytes(read_array(&buf[1072..1076])),
            nr_extent: u32::from_le_bytes(read_array(&buf[1076..1080])),
            inlined: buf[1080] != 0,
        })
    }
}

/// One payload extent of a non-inline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnodeExtent {
    /// VDI holding the payload region.
    pub vdi: u32,
    /// First data-slot index of the region.
    pub start: u64,
    /// Number of data objects in the region.
    pub count: u64,
}

impl OnodeExtent {
    /// Encodes the extent into its fixed wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; ONODE_EXTENT_SIZE] {
        let mut out = [0u8; ONODE_EXTENT_SIZE];
        out[0..4].copy_from_slice(&self.vdi.to_le_bytes());
        out[8..16].copy_from_slice(&self.start.to_le_bytes());
        out[16..24].copy_from_slice(&self.count.to_le_bytes());
        out
    }

    /// Decodes an extent from its fixed wire form.
    ///
    /// # Errors
    ///
    /// `Corrupt` if the buffer is short.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ONODE_EXTENT_SIZE {
            return Err(Error::Corrupt("short onode extent".to_string()));
        }
        Ok(Self {
            vdi: u32::from_le_bytes(read_array(&buf[0..4])),
            start: u64::from_le_bytes(read_array(&buf[8..16])),
            count: u64::from_le_bytes(read_array(&buf[16..24])),
        })
    }
}

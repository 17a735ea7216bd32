//! Snap log, snap file and trunk file formats.
//!
//! Three levels of metadata link a snapshot to its content:
//!
//! ```text
//! snap_log entry (idx, tag) -> snap file slice -> trunk file slice
//!                                                    |
//!                                  trunk entry (oid, copies, policy, sha1)*
//! ```
//!
//! All integers are little-endian. Log records and trunk entries are
//! fixed-size; name/tag fields are NUL-padded.
//!
//! ## Formats
//!
//! ```text
//! snap_log record: [idx: 4][tag: 256][sha1: 20]                  = 280 bytes
//! snap file:       [idx: 4][trunk_sha1: 20][ctime: 8]            = 32 bytes
//! trunk file:      [count: 8] then count trunk entries
//! trunk entry:     [oid: 8][nr_copies: 1][copy_policy: 1][pad: 6][sha1: 20]
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::farm::slice::{Digest, SliceStore, SHA1_DIGEST_SIZE};
use crate::util::packed_timestamp;

/// Maximum snapshot tag length, including the implicit terminator slot.
pub const MAX_TAG_LEN: usize = 256;

/// Size of one snap log record on disk.
pub const SNAP_LOG_RECORD_SIZE: usize = 4 + MAX_TAG_LEN + SHA1_DIGEST_SIZE;

/// Size of one trunk entry on disk.
pub const TRUNK_ENTRY_SIZE: usize = 8 + 1 + 1 + 6 + SHA1_DIGEST_SIZE;

const SNAP_FILE_SIZE: usize = 4 + SHA1_DIGEST_SIZE + 8;
// The pre-ctime layout, still accepted on read.
const SNAP_FILE_SIZE_LEGACY: usize = 4 + SHA1_DIGEST_SIZE;

/// One record of the append-only snap log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapLogEntry {
    /// Snapshot index; position `i` of the log holds `idx == i + 1`.
    pub idx: u32,
    /// User-supplied snapshot tag.
    pub tag: String,
    /// Digest of the snap file slice.
    pub sha1: Digest,
}

/// A decoded snap file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapFile {
    /// Snapshot index.
    pub idx: u32,
    /// Digest of the trunk file slice.
    pub trunk_sha1: Digest,
    /// Creation time, `seconds << 32 | nanos` (0 for legacy snap files).
    pub ctime: u64,
}

/// One trunk entry: an object captured by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrunkEntry {
    /// Object identifier.
    pub oid: u64,
    /// Replica count at save time.
    pub nr_copies: u8,
    /// Replication policy at save time.
    pub copy_policy: u8,
    /// Digest of the object's payload slice.
    pub sha1: Digest,
}

impl TrunkEntry {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.oid.to_le_bytes());
        out.push(self.nr_copies);
        out.push(self.copy_policy);
        out.extend_from_slice(&[0u8; 6]);
        out.extend_from_slice(&self.sha1);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < TRUNK_ENTRY_SIZE {
            return Err(Error::Corrupt("short trunk entry".to_string()));
        }
        let oid = u64::from_le_bytes(read_array(&buf[0..8]));
        let mut sha1 = [0u8; SHA1_DIGEST_SIZE];
        sha1.copy_from_slice(&buf[16..16 + SHA1_DIGEST_SIZE]);
        Ok(Self {
            oid,
            nr_copies: buf[8],
            copy_policy: buf[9],
            sha1,
        })
    }
}

fn read_array<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    out
}

fn decode_name_field(buf: &[u8]) -> Result<String> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end])
        .map(ToString::to_string)
        .map_err(|_| Error::Corrupt("non-UTF-8 name field".to_string()))
}

/// Validates a snapshot tag for logging.
///
/// # Errors
///
/// `InvalidName` if the tag is too long or contains a NUL byte.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.len() >= MAX_TAG_LEN || tag.as_bytes().contains(&0) {
        return Err(Error::InvalidName(format!("snapshot tag '{tag}'")));
    }
    Ok(())
}

/// The append-only snap log file.
#[derive(Debug, Clone)]
pub struct SnapLog {
    path: PathBuf,
}

impl SnapLog {
    /// Opens a handle on the snap log at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates an empty snap log file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be created.
    pub fn create(&self) -> Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// True iff the log file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Parses the whole log in order.
    ///
    /// # Errors
    ///
    /// `Corrupt` if the file length is not a whole number of records or a
    /// record cannot be decoded.
    pub fn read_entries(&self) -> Result<Vec<SnapLogEntry>> {
        let buf = std::fs::read(&self.path)?;
        if buf.len() % SNAP_LOG_RECORD_SIZE != 0 {
            return Err(Error::Corrupt(format!(
                "snap log length {} is not a whole number of records",
                buf.len()
            )));
        }
        buf.chunks_exact(SNAP_LOG_RECORD_SIZE)
            .map(|rec| {
                let idx = u32::from_le_bytes(read_array(&rec[0..4]));
                let tag = decode_name_field(&rec[4..4 + MAX_TAG_LEN])?;
                let sha1 = read_array(&rec[4 + MAX_TAG_LEN..SNAP_LOG_RECORD_SIZE]);
                Ok(SnapLogEntry { idx, tag, sha1 })
            })
            .collect()
    }

    /// Appends one record and makes it durable before returning.
    ///
    /// The append is the commit point of a snapshot save: a snapshot exists
    /// iff its log record does.
    ///
    /// # Errors
    ///
    /// `InvalidName` for an over-long tag; IO errors otherwise.
    pub fn append(&self, idx: u32, tag: &str, sha1: &Digest) -> Result<()> {
        validate_tag(tag)?;
        let mut rec = Vec::with_capacity(SNAP_LOG_RECORD_SIZE);
        rec.extend_from_slice(&idx.to_le_bytes());
        rec.extend_from_slice(tag.as_bytes());
        rec.resize(4 + MAX_TAG_LEN, 0);
        rec.extend_from_slice(sha1);

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&rec)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Serializes a snap file, stores it as a slice and returns its digest.
///
/// # Errors
///
/// Returns an error if the slice cannot be stored.
pub fn snap_file_write(slices: &SliceStore, idx: u32, trunk_sha1: &Digest) -> Result<Digest> {
    let snap = SnapFile {
        idx,
        trunk_sha1: *trunk_sha1,
        ctime: packed_timestamp(),
    };
    let mut buf = Vec::with_capacity(SNAP_FILE_SIZE);
    buf.extend_from_slice(&snap.idx.to_le_bytes());
    buf.extend_from_slice(&snap.trunk_sha1);
    buf.extend_from_slice(&snap.ctime.to_le_bytes());
    slices.write(&buf)
}

/// Loads and decodes a snap file slice.
///
/// # Errors
///
/// `Corrupt` if the slice is missing or malformed.
pub fn snap_file_read(slices: &SliceStore, sha1: &Digest) -> Result<SnapFile> {
    let buf = slices.read(sha1)?;
    if buf.len() != SNAP_FILE_SIZE && buf.len() != SNAP_FILE_SIZE_LEGACY {
        return Err(Error::Corrupt(format!(
            "snap file slice has length {}",
            buf.len()
        )));
    }
    let idx = u32::from_le_bytes(read_array(&buf[0..4]));
    let trunk_sha1 = read_array(&buf[4..4 + SHA1_DIGEST_SIZE]);
    let ctime = if buf.len() == SNAP_FILE_SIZE {
        u64::from_le_bytes(read_array(&buf[4 + SHA1_DIGEST_SIZE..]))
    } else {
        0
    };
    Ok(SnapFile {
        idx,
        trunk_sha1,
        ctime,
    })
}

/// Serializes `(count, entries...)`, stores it as a slice and returns its
/// digest.
///
/// # Errors
///
/// Returns an error if the slice cannot be stored.
pub fn trunk_file_write(slices: &SliceStore, entries: &[TrunkEntry]) -> Result<Digest> {
    let mut buf = Vec::with_capacity(8 + entries.len() * TRUNK_ENTRY_SIZE);
    buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for entry in entries {
        entry.encode_into(&mut buf);
    }
    slices.write(&buf)
}

/// Streams the entries of a trunk file to `f`, passing the total entry
/// count alongside each entry for progress reporting.
///
/// # Errors
///
/// `Corrupt` if the trunk slice is missing or malformed; errors from `f`
/// propagate and stop the stream.
pub fn for_each_trunk_entry<F>(slices: &SliceStore, trunk_sha1: &Digest, mut f: F) -> Result<()>
where
    F: FnMut(&TrunkEntry, u64) -> Result<()>,
{
    let buf = slices.read(trunk_sha1)?;
    if buf.len() < 8 {
        return Err(Error::Corrupt("short trunk file".to_string()));
    }
    let count = u64::from_le_bytes(read_array(&buf[0..8]));
    let body = &buf[8..];
    let expected = count.checked_mul(TRUNK_ENTRY_SIZE as u64);
    if expected != Some(body.len() as u64) {
        return Err(Error::Corrupt(format!(
            "trunk file claims {count} entries but carries {} bytes",
            body.len()
        )));
    }
    for chunk in body.chunks_exact(TRUNK_ENTRY_SIZE) {
        f(&TrunkEntry::decode(chunk)?, count)?;
    }
    Ok(())
}

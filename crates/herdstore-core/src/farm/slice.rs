//! Content-addressed slice store.
//!
//! Slices live under `<root>/objects/<hh>/<40-hex-digest>` where `<hh>` is
//! the first digest byte in hex. The digest is the SHA-1 of the slice's
//! bytes, so writes are idempotent: re-storing existing content is a no-op.
//! New slices are written to a temp file in the shard directory and renamed
//! into place.

use std::fs;
use std::path::{Path, PathBuf};

use sha1::{Digest as _, Sha1};
use tracing::debug;

use crate::error::{Error, Result};

/// Size of a slice digest in bytes.
pub const SHA1_DIGEST_SIZE: usize = 20;

/// A slice digest; doubles as the slice's name in the object directory.
pub type Digest = [u8; SHA1_DIGEST_SIZE];

/// Computes the digest of a byte slice.
#[must_use]
pub fn sha1_digest(buf: &[u8]) -> Digest {
    Sha1::digest(buf).into()
}

/// Handle on the sharded object directory.
#[derive(Debug, Clone)]
pub struct SliceStore {
    object_dir: PathBuf,
}

impl SliceStore {
    /// Opens a slice store rooted at `object_dir`.
    ///
    /// The directory tree must already exist (see `Farm::init`).
    #[must_use]
    pub fn new(object_dir: PathBuf) -> Self {
        Self { object_dir }
    }

    /// Returns the object directory this store is rooted at.
    #[must_use]
    pub fn object_dir(&self) -> &Path {
        &self.object_dir
    }

    fn slice_path(&self, digest: &Digest) -> PathBuf {
        self.object_dir
            .join(format!("{:02x}", digest[0]))
            .join(hex::encode(digest))
    }

    /// Stores `buf` and returns its digest.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the slice cannot be written.
    pub fn write(&self, buf: &[u8]) -> Result<Digest> {
        let digest = sha1_digest(buf);
        let path = self.slice_path(&digest);
        if path.exists() {
            debug!(slice = %hex::encode(digest), "slice already stored");
            return Ok(digest);
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, buf)?;
        fs::rename(&tmp_path, &path)?;
        Ok(digest)
    }

    /// Loads the slice named by `digest`.
    ///
    /// # Errors
    ///
    /// A missing slice is reported as corruption: every referenced digest
    /// must be retrievable.
    pub fn read(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.slice_path(digest);
        match fs::read(&path) {
            Ok(buf) => Ok(buf),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::Corrupt(format!(
                "missing slice {}",
                hex::encode(digest)
            ))),
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// True iff a slice with this digest is stored.
    #[must_use]
    pub fn contains(&self, digest: &Digest) -> bool {
        self.slice_path(digest).exists()
    }
}

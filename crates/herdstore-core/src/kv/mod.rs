//! Object-storage layer: accounts, buckets and objects over hyper volumes.
//!
//! An account is a hyper VDI whose data objects hold fixed-stride
//! [`record::BucketInode`] slots placed by hashing. Each bucket owns a
//! second hyper VDI named `account/bucket` whose data objects hold onodes.
//!
//! ```text
//! account vdi
//! +------------+---+---------------------------+---+---------------------------+--
//! | name: coly |...| bucket_inode (name: jetta)|...| bucket_inode (name: volvo)|..
//! +------------+---+---------------------------+---+---------------------------+--
//!                                 |                              |
//! bucket vdi                      v                              |
//! +------------------+--------+                                  |
//! | name: coly/jetta | onodes |      bucket vdi                  v
//! +------------------+--------+      +------------------+--------+
//!                                    | name: coly/volvo | onodes |
//!                                    +------------------+--------+
//! ```
//!
//! # Module Structure
//!
//! - [`record`]: the fixed binary records of the layout
//! - `bucket`: account/bucket operations (hash + linear probing)
//! - `object`: onode CRUD and listing

pub mod record;

mod bucket;
mod object;

#[cfg(test)]
mod object_tests;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::KvConfig;
use crate::error::{Error, Result};
use crate::store::geometry::MAX_VDI_SIZE;
use crate::store::traits::{BlockStore, VdiCreateParams};

/// HTTP response status emitted at the front-end boundary.
///
/// The front-end itself lives outside this crate; operations here return
/// [`Result`]s, and this type is the agreed mapping to wire statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    /// 200.
    Ok,
    /// 201.
    Created,
    /// 202.
    Accepted,
    /// 204.
    NoContent,
    /// 404.
    NotFound,
    /// 500.
    InternalServerError,
    /// 503.
    ServiceUnavailable,
}

impl HttpStatus {
    /// Returns the numeric status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::Accepted => 202,
            Self::NoContent => 204,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Maps an operation error to its response status.
    #[must_use]
    pub const fn from_error(err: &Error) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else if matches!(err, Error::NoSpace(_)) {
            Self::ServiceUnavailable
        } else {
            Self::InternalServerError
        }
    }
}

/// FNV-1a 64-bit hash used for slot placement.
///
/// The placement must be stable across processes and versions, so this is
/// spelled out rather than delegated to a runtime-seeded hasher.
#[must_use]
pub(crate) fn placement_hash(name: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for &byte in name.as_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The object-storage engine.
///
/// Stateless apart from its block-store handle and the replication
/// defaults applied to the hyper volumes it creates.
pub struct Kv {
    store: Arc<dyn BlockStore>,
    nr_copies: u8,
    copy_policy: u8,
}

impl Kv {
    /// Creates an engine with default replication (3 full copies).
    #[must_use]
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            store,
            nr_copies: 3,
            copy_policy: 0,
        }
    }

    /// Creates an engine with replication defaults from configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn BlockStore>, config: &KvConfig) -> Self {
        Self {
            store,
            nr_copies: config.nr_copies,
            copy_policy: config.copy_policy,
        }
    }

    pub(crate) fn store(&self) -> &dyn BlockStore {
        self.store.as_ref()
    }

    /// Creates a hyper volume: a maximum-size VDI with hash placement.
    pub(crate) fn create_hyper_volume(&self, name: &str) -> Result<u32> {
        let vid = self.store.vdi_create(&VdiCreateParams {
            name: name.to_string(),
            size: MAX_VDI_SIZE,
            base_vid: 0,
            snapshot: false,
            nr_copies: self.nr_copies,
            copy_policy: self.copy_policy,
            store_policy: 1,
        })?;
        debug!(name, vid, "created hyper volume");
        Ok(vid)
    }

    pub(crate) const fn nr_copies(&self) -> u8 {
        self.nr_copies
    }

    pub(crate) const fn copy_policy(&self) -> u8 {
        self.copy_policy
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// `VdiExists` if the account already exists.
    pub fn create_account(&self, account: &str) -> Result<()> {
        self.create_hyper_volume(account)?;
        info!(account, "created account");
        Ok(())
    }

    /// Returns the number of buckets in an account.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account does not exist.
    pub fn read_account(&self, account: &str) -> Result<u32> {
        let account_vid = self.store.vdi_lookup(account)?;
        let inode = self.store.inode_read(account_vid)?;
        self.for_each_bucket(&inode, |_| {})
    }

    /// Deletes an account VDI.
    ///
    /// The caller is responsible for the account being empty; bucket VDIs
    /// are separate volumes and are not swept here.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account does not exist.
    pub fn delete_account(&self, account: &str) -> Result<()> {
        self.store.vdi_delete(account)?;
        info!(account, "deleted account");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HttpStatus::Created.code(), 201);
        assert_eq!(HttpStatus::NoContent.code(), 204);
        assert_eq!(HttpStatus::ServiceUnavailable.code(), 503);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            HttpStatus::from_error(&Error::NoVdi("b".into())),
            HttpStatus::NotFound
        );
        assert_eq!(
            HttpStatus::from_error(&Error::ObjectNotFound {
                bucket: "b".into(),
                object: "o".into()
            }),
            HttpStatus::NotFound
        );
        assert_eq!(
            HttpStatus::from_error(&Error::NoSpace("full".into())),
            HttpStatus::ServiceUnavailable
        );
        assert_eq!(
            HttpStatus::from_error(&Error::NotImplemented("extents")),
            HttpStatus::InternalServerError
        );
    }

    #[test]
    fn test_placement_hash_is_stable() {
        // Pinned values: on-disk placement depends on them.
        assert_eq!(placement_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(placement_hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_ne!(placement_hash("jetta"), placement_hash("volvo"));
    }
}

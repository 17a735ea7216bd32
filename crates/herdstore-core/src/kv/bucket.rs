//! Bucket operations inside an account VDI.
//!
//! Bucket records are placed by open addressing over the account's
//! `MAX_BUCKETS` slots:
//!
//! ```text
//! start = placement_hash(bucket) % MAX_BUCKETS
//! probe i = 0, 1, 2, ... at slot (start + i) % MAX_BUCKETS
//! ```
//!
//! Each slot lives inside a data object holding `BUCKETS_PER_OBJ` records.
//! When the inner step reports the data object full (create) or without a
//! match (delete), the probe cursor jumps a whole data object ahead.

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::kv::placement_hash;
use crate::kv::record::{BucketInode, BUCKETS_PER_OBJ, BUCKET_INODE_SIZE, MAX_BUCKETS, MAX_BUCKET_NAME};
use crate::kv::Kv;
use crate::store::geometry::{vid_to_data_oid, DATA_OBJ_SIZE};
use crate::store::inode::VdiInode;
use crate::store::traits::WriteOptions;

/// Result of one probe step against a single data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    /// The step succeeded at this record slot of the data object.
    Placed(usize),
    /// Nothing to do in this data object; skip to the next one.
    FullObject,
}

pub(crate) fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty() || bucket.len() >= MAX_BUCKET_NAME || bucket.as_bytes().contains(&0) {
        return Err(Error::InvalidName(format!("bucket '{bucket}'")));
    }
    Ok(())
}

impl Kv {
    /// Creates a bucket in an account.
    ///
    /// Allocates a record slot by hash probing and creates the bucket's own
    /// hyper volume named `account/bucket`.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account does not exist, `VdiExists` if the bucket
    /// does, `NoSpace` when every slot is taken.
    pub fn create_bucket(&self, account: &str, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        let account_vid = self.store().vdi_lookup(account).map_err(|err| {
            error!("failed to find account {account}: {err}");
            err
        })?;
        let mut inode = self.store().inode_read(account_vid)?;

        let vdi_name = format!("{account}/{bucket}");
        match self.store().vdi_lookup(&vdi_name) {
            Ok(_) => return Err(Error::VdiExists(vdi_name)),
            Err(Error::NoVdi(_)) => {}
            Err(err) => return Err(err),
        }

        let hval = placement_hash(bucket) % MAX_BUCKETS;
        let mut i = 0;
        while i < MAX_BUCKETS {
            let idx = (hval + i) % MAX_BUCKETS;
            match self.add_bucket(&mut inode, idx, account, bucket)? {
                ProbeOutcome::Placed(slot) => {
                    debug!(account, bucket, idx, slot, "added bucket");
                    return Ok(());
                }
                ProbeOutcome::FullObject => i += BUCKETS_PER_OBJ,
            }
        }

        error!("account {account} is full");
        Err(Error::NoSpace(format!("account {account}")))
    }

    /// Deletes a bucket from an account.
    ///
    /// Frees the record slot, deletes the bucket VDI, and discards the
    /// record's data object if it becomes entirely empty.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account or bucket does not exist.
    pub fn delete_bucket(&self, account: &str, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        let account_vid = self.store().vdi_lookup(account).map_err(|err| {
            error!("failed to find account {account}: {err}");
            err
        })?;
        let mut inode = self.store().inode_read(account_vid)?;

        // The bucket VDI existing is what "the bucket exists" means.
        let vdi_name = format!("{account}/{bucket}");
        self.store().vdi_lookup(&vdi_name)?;

        let hval = placement_hash(bucket) % MAX_BUCKETS;
        let mut i = 0;
        while i < MAX_BUCKETS {
            let idx = (hval + i) % MAX_BUCKETS;
            match self.remove_bucket(&mut inode, idx, account, bucket)? {
                ProbeOutcome::Placed(slot) => {
                    debug!(account, bucket, idx, slot, "deleted bucket");
                    return Ok(());
                }
                ProbeOutcome::FullObject => i += BUCKETS_PER_OBJ,
            }
        }

        error!("bucket {bucket} not found in account {account}");
        Err(Error::NoVdi(vdi_name))
    }

    /// Looks up a bucket, returning the vid of its VDI.
    ///
    /// Reads go through the naming convention, not the hash table.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account or bucket does not exist.
    pub fn get_bucket(&self, account: &str, bucket: &str) -> Result<u32> {
        let account_vid = self.store().vdi_lookup(account)?;
        let inode = self.store().inode_read(account_vid)?;
        self.store().vdi_lookup(&format!("{}/{bucket}", inode.name))
    }

    /// Emits every bucket name in the account through `cb`.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the account does not exist.
    pub fn list_buckets<F>(&self, account: &str, cb: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let account_vid = self.store().vdi_lookup(account).map_err(|err| {
            error!("failed to find account {account}: {err}");
            err
        })?;
        let inode = self.store().inode_read(account_vid)?;
        self.for_each_bucket(&inode, cb)?;
        Ok(())
    }

    /// Walks the account's extents and emits each occupied bucket record,
    /// returning how many were seen.
    pub(crate) fn for_each_bucket<F>(&self, inode: &VdiInode, mut cb: F) -> Result<u32>
    where
        F: FnMut(&str),
    {
        let mut counter = 0u32;
        for (data_index, vdi_id) in inode.extents() {
            let oid = vid_to_data_oid(vdi_id, data_index);
            let mut buf = vec![0u8; DATA_OBJ_SIZE];
            self.store().read_object(oid, &mut buf, 0).map_err(|err| {
                error!("failed to read data object {oid:#018x}: {err}");
                err
            })?;

            for slot in 0..BUCKETS_PER_OBJ as usize {
                let off = slot * BUCKET_INODE_SIZE;
                let bnode = BucketInode::decode(&buf[off..off + BUCKET_INODE_SIZE])?;
                if bnode.is_empty_slot() {
                    continue;
                }
                cb(&bnode.bucket_name);
                counter += 1;
            }
        }
        Ok(counter)
    }

    /// Inner create step against the data object holding slot `idx`.
    ///
    /// Scans record slots from `idx`'s offset to the end of the data
    /// object for a free one; fills it and back-links a freshly created
    /// data object into the account inode when needed.
    fn add_bucket(
        &self,
        inode: &mut VdiInode,
        idx: u64,
        account: &str,
        bucket: &str,
    ) -> Result<ProbeOutcome> {
        #[allow(clippy::cast_possible_truncation)] // MAX_BUCKETS / BUCKETS_PER_OBJ fits u32
        let data_index = (idx / BUCKETS_PER_OBJ) as u32;
        #[allow(clippy::cast_possible_truncation)]
        let offset = (idx % BUCKETS_PER_OBJ) as usize;

        let vdi_id = inode.get_vid(data_index);
        let create = vdi_id == 0;
        let oid = vid_to_data_oid(inode.vdi_id, data_index);
        let mut buf = vec![0u8; DATA_OBJ_SIZE];
        if !create {
            self.store().read_object(oid, &mut buf, 0).map_err(|err| {
                error!("failed to read data object {oid:#018x}: {err}");
                err
            })?;
        }

        let mut placed = None;
        for slot in offset..BUCKETS_PER_OBJ as usize {
            let off = slot * BUCKET_INODE_SIZE;
            let bnode = BucketInode::decode(&buf[off..off + BUCKET_INODE_SIZE])?;
            if !bnode.is_empty_slot() {
                continue;
            }

            let vdi_name = format!("{account}/{bucket}");
            let onode_vid = self.create_hyper_volume(&vdi_name)?;
            let bnode = BucketInode {
                bucket_name: bucket.to_string(),
                obj_count: 0,
                bytes_used: 0,
                onode_vid,
            };
            buf[off..off + BUCKET_INODE_SIZE].copy_from_slice(&bnode.encode()?);
            placed = Some(slot);
            break;
        }

        let Some(slot) = placed else {
            return Ok(ProbeOutcome::FullObject);
        };

        if create {
            self.store().write_object(
                oid,
                &buf,
                0,
                &WriteOptions::create(self.nr_copies(), self.copy_policy()),
            )?;
            inode.set_vid(data_index, inode.vdi_id);
            self.store()
                .inode_write_vid(inode, data_index, inode.vdi_id, inode.vdi_id)?;
        } else {
            let off = slot * BUCKET_INODE_SIZE;
            self.store().write_object(
                oid,
                &buf[off..off + BUCKET_INODE_SIZE],
                off as u64,
                &WriteOptions::overwrite(),
            )?;
        }
        Ok(ProbeOutcome::Placed(slot))
    }

    /// Inner delete step against the data object holding slot `idx`.
    ///
    /// Scans the whole data object, counting empty slots alongside the
    /// name match so that freeing the last occupied record can discard the
    /// data object and clear its extent.
    fn remove_bucket(
        &self,
        inode: &mut VdiInode,
        idx: u64,
        account: &str,
        bucket: &str,
    ) -> Result<ProbeOutcome> {
        #[allow(clippy::cast_possible_truncation)]
        let data_index = (idx / BUCKETS_PER_OBJ) as u32;

        let vdi_id = inode.get_vid(data_index);
        if vdi_id == 0 {
            error!("data object {data_index} missing in account {}", inode.name);
            return Err(Error::Internal(format!(
                "account {} has no data object {data_index}",
                inode.name
            )));
        }

        let oid = vid_to_data_oid(inode.vdi_id, data_index);
        let mut buf = vec![0u8; DATA_OBJ_SIZE];
        self.store().read_object(oid, &mut buf, 0).map_err(|err| {
            error!("failed to read data object {oid:#018x}: {err}");
            err
        })?;

        let mut empty_slots = 0u64;
        let mut found = None;
        for slot in 0..BUCKETS_PER_OBJ as usize {
            let off = slot * BUCKET_INODE_SIZE;
            let mut bnode = BucketInode::decode(&buf[off..off + BUCKET_INODE_SIZE])?;
            if bnode.is_empty_slot() {
                empty_slots += 1;
                continue;
            }
            if bnode.bucket_name != bucket {
                continue;
            }

            found = Some(slot);
            bnode.onode_vid = 0;
            buf[off..off + BUCKET_INODE_SIZE].copy_from_slice(&bnode.encode()?);

            let vdi_name = format!("{account}/{bucket}");
            self.store().vdi_delete(&vdi_name).map_err(|err| {
                error!("failed to delete vdi {vdi_name}: {err}");
                err
            })?;
        }

        let Some(slot) = found else {
            return Ok(ProbeOutcome::FullObject);
        };

        if empty_slots == BUCKETS_PER_OBJ - 1 {
            // The freed record was the only occupied one: drop the whole
            // data object and clear its extent.
            self.store().discard_object(oid)?;
            inode.set_vid(data_index, 0);
            self.store()
                .inode_write_vid(inode, data_index, vdi_id, vdi_id)?;
            debug!(oid, vdi_id, "discarded empty bucket data object");
        } else {
            let off = slot * BUCKET_INODE_SIZE;
            self.store().write_object(
                oid,
                &buf[off..off + BUCKET_INODE_SIZE],
                off as u64,
                &WriteOptions::overwrite(),
            )?;
        }
        Ok(ProbeOutcome::Placed(slot))
    }
}

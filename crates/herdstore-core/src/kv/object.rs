//! Object operations inside a bucket VDI.
//!
//! Objects are placed into the bucket's `MAX_DATA_OBJS` data slots by the
//! same hash-and-probe scheme as bucket records. The data object at a slot
//! starts with an [`OnodeHdr`]; small payloads follow it inline. A header
//! whose name is empty is a tombstone left by a delete and is transparent
//! to every operation here.
//!
//! Probe loops terminate on a typed outcome from each step, never on
//! response-state side effects: a name match ends the probe with the
//! operation's result, an unallocated slot ends it with not-found, and a
//! mismatching or tombstoned slot moves the probe to the next slot.

use sha1::{Digest as _, Sha1};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::kv::placement_hash;
use crate::kv::record::{OnodeHdr, MAX_OBJECT_NAME, ONODE_HDR_SIZE, ONODE_INLINE_SIZE};
use crate::kv::Kv;
use crate::store::geometry::{vid_to_data_oid, MAX_DATA_OBJS};
use crate::store::inode::VdiInode;
use crate::store::traits::WriteOptions;
use crate::util::packed_timestamp;

fn validate_object_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_OBJECT_NAME || name.as_bytes().contains(&0) {
        return Err(Error::InvalidName(format!("object '{name}'")));
    }
    Ok(())
}

fn not_found(bucket: &str, object: &str) -> Error {
    info!("object {object} doesn't exist in {bucket}");
    Error::ObjectNotFound {
        bucket: bucket.to_string(),
        object: object.to_string(),
    }
}

/// What a probe step decided.
enum Step<T> {
    /// The object was found at this slot; the operation is done.
    Done(T),
    /// The slot is held by another object or a tombstone; keep probing.
    Continue,
}

impl Kv {
    /// Creates an object in a bucket, overwriting any object of the same
    /// name in place.
    ///
    /// `bucket` is the bucket VDI name, i.e. `account/bucket`. The payload
    /// must fit inline behind the onode header.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the bucket does not exist, `NotImplemented` for payloads
    /// above [`ONODE_INLINE_SIZE`], `NoSpace` when every slot is taken.
    pub fn create_object(&self, bucket: &str, name: &str, payload: &[u8]) -> Result<()> {
        validate_object_name(name)?;
        if payload.len() > ONODE_INLINE_SIZE {
            return Err(Error::NotImplemented("extent-based (non-inline) objects"));
        }
        let vid = self.lookup_bucket(bucket)?;
        let mut inode = self.store().inode_read(vid)?;

        let now = packed_timestamp();
        let hdr = OnodeHdr {
            name: name.to_string(),
            sha1: Sha1::digest(payload).into(),
            size: payload.len() as u64,
            ctime: now,
            mtime: now,
            data_vid: 0,
            nr_extent: 0,
            inlined: true,
        };

        let hval = placement_hash(name) % MAX_DATA_OBJS;
        for i in 0..MAX_DATA_OBJS {
            #[allow(clippy::cast_possible_truncation)] // MAX_DATA_OBJS fits u32
            let idx = ((hval + i) % MAX_DATA_OBJS) as u32;
            match self.create_object_at(&mut inode, &hdr, payload, idx)? {
                Step::Done(()) => return Ok(()),
                Step::Continue => {}
            }
        }

        error!("no free object slot in bucket {bucket}");
        Err(Error::NoSpace(format!("bucket {bucket}")))
    }

    /// Reads an object's payload.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the bucket does not exist, `ObjectNotFound` if no slot
    /// holds the name.
    pub fn read_object(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        validate_object_name(name)?;
        let vid = self.lookup_bucket(bucket)?;

        let hval = placement_hash(name) % MAX_DATA_OBJS;
        for i in 0..MAX_DATA_OBJS {
            #[allow(clippy::cast_possible_truncation)]
            let idx = ((hval + i) % MAX_DATA_OBJS) as u32;
            let oid = vid_to_data_oid(vid, idx);

            let hdr = match self.read_onode_hdr(oid) {
                Ok(hdr) => hdr,
                Err(Error::NoObject(_)) => return Err(not_found(bucket, name)),
                Err(err) => {
                    error!("failed to read {bucket}/{name}: {err}");
                    return Err(err);
                }
            };
            if hdr.name != name {
                continue;
            }

            if hdr.size > ONODE_INLINE_SIZE as u64 {
                return Err(Error::Corrupt(format!(
                    "onode {name} claims {} inline bytes",
                    hdr.size
                )));
            }
            #[allow(clippy::cast_possible_truncation)] // bounded just above
            let mut body = vec![0u8; hdr.size as usize];
            self.store()
                .read_object(oid, &mut body, ONODE_HDR_SIZE as u64)?;
            return Ok(body);
        }

        Err(not_found(bucket, name))
    }

    /// Replaces an object's payload, updating `mtime`, `size` and the
    /// etag while keeping its slot and creation time.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the bucket does not exist, `ObjectNotFound` if no slot
    /// holds the name, `NotImplemented` for non-inline payloads.
    pub fn update_object(&self, bucket: &str, name: &str, payload: &[u8]) -> Result<()> {
        validate_object_name(name)?;
        if payload.len() > ONODE_INLINE_SIZE {
            return Err(Error::NotImplemented("extent-based (non-inline) objects"));
        }
        let vid = self.lookup_bucket(bucket)?;

        let hval = placement_hash(name) % MAX_DATA_OBJS;
        for i in 0..MAX_DATA_OBJS {
            #[allow(clippy::cast_possible_truncation)]
            let idx = ((hval + i) % MAX_DATA_OBJS) as u32;
            let oid = vid_to_data_oid(vid, idx);

            let mut hdr = match self.read_onode_hdr(oid) {
                Ok(hdr) => hdr,
                Err(Error::NoObject(_)) => return Err(not_found(bucket, name)),
                Err(err) => {
                    error!("failed to read {bucket}/{name}: {err}");
                    return Err(err);
                }
            };
            if hdr.name != name {
                continue;
            }

            hdr.mtime = packed_timestamp();
            hdr.size = payload.len() as u64;
            hdr.sha1 = Sha1::digest(payload).into();
            let mut buf = hdr.encode()?;
            buf.extend_from_slice(payload);
            self.store()
                .write_object(oid, &buf, 0, &WriteOptions::overwrite())
                .map_err(|err| {
                    error!("failed to update object {oid:#018x}: {err}");
                    err
                })?;
            debug!(bucket, name, idx, "updated object");
            return Ok(());
        }

        Err(not_found(bucket, name))
    }

    /// Deletes an object by tombstoning its header name.
    ///
    /// The slot is not compacted; later probes treat it as transparent.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the bucket does not exist, `ObjectNotFound` if no slot
    /// holds the name.
    pub fn delete_object(&self, bucket: &str, name: &str) -> Result<()> {
        validate_object_name(name)?;
        let vid = self.lookup_bucket(bucket)?;

        let hval = placement_hash(name) % MAX_DATA_OBJS;
        for i in 0..MAX_DATA_OBJS {
            #[allow(clippy::cast_possible_truncation)]
            let idx = ((hval + i) % MAX_DATA_OBJS) as u32;
            let oid = vid_to_data_oid(vid, idx);

            let mut nbuf = vec![0u8; MAX_OBJECT_NAME];
            match self.store().read_object(oid, &mut nbuf, 0) {
                Ok(()) => {}
                Err(Error::NoObject(_)) => return Err(not_found(bucket, name)),
                Err(err) => {
                    error!("failed to read {bucket}/{name}: {err}");
                    return Err(err);
                }
            }
            let end = nbuf.iter().position(|&b| b == 0).unwrap_or(nbuf.len());
            if &nbuf[..end] != name.as_bytes() {
                continue;
            }

            nbuf.fill(0);
            self.store()
                .write_object(oid, &nbuf, 0, &WriteOptions::overwrite())
                .map_err(|err| {
                    error!("failed to tombstone object {oid:#018x}: {err}");
                    err
                })?;
            debug!(bucket, name, idx, "deleted object");
            return Ok(());
        }

        Err(not_found(bucket, name))
    }

    /// Emits every live object name in the bucket through `cb`.
    ///
    /// Tombstoned slots are skipped; unreadable slots are logged and
    /// skipped rather than failing the listing.
    ///
    /// # Errors
    ///
    /// `NoVdi` if the bucket does not exist.
    pub fn list_objects<F>(&self, bucket: &str, mut cb: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let vid = self.lookup_bucket(bucket)?;
        let inode = self.store().inode_read(vid)?;

        for (idx, slot_vid) in inode.extents() {
            if slot_vid == 0 {
                continue;
            }
            let oid = vid_to_data_oid(vid, idx);
            let mut nbuf = vec![0u8; MAX_OBJECT_NAME];
            if let Err(err) = self.store().read_object(oid, &mut nbuf, 0) {
                error!("failed to read object {oid:#018x} in {bucket}: {err}");
                continue;
            }
            if nbuf[0] == 0 {
                continue;
            }
            let end = nbuf.iter().position(|&b| b == 0).unwrap_or(nbuf.len());
            match std::str::from_utf8(&nbuf[..end]) {
                Ok(name) => cb(name),
                Err(_) => error!("non-UTF-8 object name in {bucket} at slot {idx}"),
            }
        }
        Ok(())
    }

    /// Creates or overwrites at one slot.
    ///
    /// Returns `Step::Continue` when the slot is taken by another object.
    fn create_object_at(
        &self,
        inode: &mut VdiInode,
        hdr: &OnodeHdr,
        payload: &[u8],
        idx: u32,
    ) -> Result<Step<()>> {
        let vid = inode.vdi_id;
        let oid = vid_to_data_oid(vid, idx);
        let cur_vid = inode.get_vid(idx);

        if cur_vid != 0 {
            let existing = self.read_onode_hdr(oid)?;
            if !existing.is_tombstone() && existing.name != hdr.name {
                debug!(idx, "slot already used");
                return Ok(Step::Continue);
            }
        }

        let mut buf = hdr.encode()?;
        buf.extend_from_slice(payload);
        if cur_vid != 0 {
            info!("overwriting object {}", hdr.name);
            self.store()
                .write_object(oid, &buf, 0, &WriteOptions::overwrite())?;
        } else {
            self.store().write_object(
                oid,
                &buf,
                0,
                &WriteOptions::create(self.nr_copies(), self.copy_policy()),
            )?;
            inode.set_vid(idx, vid);
            self.store().inode_write_vid(inode, idx, vid, vid)?;
        }
        debug!(name = %hdr.name, idx, "created object");
        Ok(Step::Done(()))
    }

    fn read_onode_hdr(&self, oid: u64) -> Result<OnodeHdr> {
        let mut buf = vec![0u8; ONODE_HDR_SIZE];
        self.store().read_object(oid, &mut buf, 0)?;
        OnodeHdr::decode(&buf)
    }

    fn lookup_bucket(&self, bucket: &str) -> Result<u32> {
        self.store().vdi_lookup(bucket).map_err(|err| {
            if matches!(err, Error::NoVdi(_)) {
                info!("no such bucket {bucket}");
            } else {
                error!("failed to find bucket {bucket}: {err}");
            }
            err
        })
    }
}

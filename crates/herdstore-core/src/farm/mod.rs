//! Content-addressed snapshot engine.
//!
//! The farm captures the full object set of the cluster into a local
//! archive and can restore any previous snapshot, re-creating the logical
//! volumes it referenced.
//!
//! # Module Structure
//!
//! - [`slice`]: content-addressed slice store (`<root>/objects/<hh>/...`)
//! - [`snap`]: snap log / snap file / trunk file metadata formats
//! - [`registry`]: restore-time VDI registry
//! - [`work`]: worker pools, error latch, progress counter
//! - [`async_ops`]: `spawn_blocking` wrappers for async callers

pub mod async_ops;
pub mod registry;
pub mod slice;
pub mod snap;
pub mod work;

#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod slice_tests;
#[cfg(test)]
mod snap_tests;
#[cfg(test)]
mod work_tests;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::store::geometry::{get_objsize, is_vdi_obj, oid_to_vid};
use crate::store::inode::VdiInode;
use crate::store::traits::{BlockStore, ObjectRef, WriteOptions};

use registry::VdiRegistry;
use slice::{Digest, SliceStore};
use snap::{SnapLog, TrunkEntry};
use work::{Discipline, ErrorLatch, Progress, WorkQueue};

const SNAP_LOG_NAME: &str = "snap_log";
const OBJECT_DIR_NAME: &str = "objects";

/// A snapshot archive rooted at a local directory.
///
/// Owns the slice store, the snap log and a handle on the block store; all
/// per-operation state (worker pool, registry, error latch) is scoped to a
/// single save or load.
pub struct Farm {
    root: PathBuf,
    slices: SliceStore,
    log: SnapLog,
    store: Arc<dyn BlockStore>,
    nr_workers: usize,
}

impl fmt::Debug for Farm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Farm")
            .field("root", &self.root)
            .field("slices", &self.slices)
            .field("log", &self.log)
            .field("nr_workers", &self.nr_workers)
            .finish_non_exhaustive()
    }
}

impl Farm {
    /// Creates a fresh archive at `path`.
    ///
    /// Creates `path`, `path/objects`, the 256 shard directories and the
    /// empty snap log.
    ///
    /// # Errors
    ///
    /// Fails if `path` already exists or any directory cannot be created.
    pub fn init<P: AsRef<Path>>(path: P, store: Arc<dyn BlockStore>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                error!(path = %root.display(), "path is not a directory");
                return Err(Error::Init(format!(
                    "Path is not a directory: {}",
                    root.display()
                )));
            }
            Err(err) => return Err(Error::Io(err)),
        }

        let object_dir = root.join(OBJECT_DIR_NAME);
        fs::create_dir(&object_dir)?;
        for shard in 0..=0xffu32 {
            fs::create_dir(object_dir.join(format!("{shard:02x}")))?;
        }

        let log = SnapLog::new(root.join(SNAP_LOG_NAME));
        log.create()?;
        info!(path = %root.display(), "initialized farm archive");

        Ok(Self {
            slices: SliceStore::new(object_dir),
            log,
            root,
            store,
            nr_workers: 0,
        })
    }

    /// Attaches to an existing archive at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the archive layout (object directory and snap log) is not
    /// present.
    pub fn open<P: AsRef<Path>>(path: P, store: Arc<dyn BlockStore>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let object_dir = root.join(OBJECT_DIR_NAME);
        let log = SnapLog::new(root.join(SNAP_LOG_NAME));
        if !object_dir.is_dir() || !log.exists() {
            return Err(Error::Init(format!(
                "Not a farm archive: {}",
                root.display()
            )));
        }
        Ok(Self {
            slices: SliceStore::new(object_dir),
            log,
            root,
            store,
            nr_workers: 0,
        })
    }

    /// Sets the worker-thread count for save/load (0 = one per core).
    #[must_use]
    pub fn with_workers(mut self, nr_workers: usize) -> Self {
        self.nr_workers = nr_workers;
        self
    }

    /// Returns the archive root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the slice store of this archive.
    #[must_use]
    pub fn slices(&self) -> &SliceStore {
        &self.slices
    }

    /// Returns the snap log of this archive.
    #[must_use]
    pub fn snap_log(&self) -> &SnapLog {
        &self.log
    }

    /// True iff `(idx, tag)` resolves to a snapshot.
    #[must_use]
    pub fn contain_snapshot(&self, idx: u32, tag: &str) -> bool {
        self.resolve_trunk(idx, tag).is_ok()
    }

    /// Resolves `(idx, tag)` to the snapshot's trunk digest.
    ///
    /// A log entry matches when its index equals `idx` or its tag equals
    /// `tag`; the first match wins.
    fn resolve_trunk(&self, idx: u32, tag: &str) -> Result<Digest> {
        let entries = self.log.read_entries()?;
        for entry in &entries {
            if entry.idx != idx && entry.tag != tag {
                continue;
            }
            let snap = snap::snap_file_read(&self.slices, &entry.sha1)?;
            return Ok(snap.trunk_sha1);
        }
        Err(Error::SnapshotNotFound {
            idx,
            tag: tag.to_string(),
        })
    }

    /// Captures the current object set of the block store as a snapshot
    /// tagged `tag`, returning the new snapshot index.
    ///
    /// The log append is the commit point: if this fails partway, the
    /// snapshot does not exist and any slices already written are orphans.
    ///
    /// # Errors
    ///
    /// Fails on tag validation, any object transfer error or a log/slice
    /// IO error.
    pub fn save_snapshot(&self, tag: &str) -> Result<u32> {
        snap::validate_tag(tag)?;
        let log_entries = self.log.read_entries()?;
        let idx = u32::try_from(log_entries.len() + 1)
            .map_err(|_| Error::Internal("snap log index overflow".to_string()))?;

        let objects = self.store.object_refs();
        let total = objects.len() as u64;
        let slots: Arc<Mutex<Vec<Option<TrunkEntry>>>> =
            Arc::new(Mutex::new(vec![None; objects.len()]));
        let latch = ErrorLatch::new();
        let progress = Arc::new(Progress::new(total));

        let mut wq = WorkQueue::new("save snapshot", Discipline::Ordered, self.nr_workers)?;
        for (i, obj) in objects.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let slices = self.slices.clone();
            let latch = latch.clone();
            let slots = Arc::clone(&slots);
            let progress = Arc::clone(&progress);
            wq.queue(move || {
                let entry = if latch.is_set() {
                    None
                } else {
                    match save_object(store.as_ref(), &slices, &obj) {
                        Ok(sha1) => Some(TrunkEntry {
                            oid: obj.oid,
                            nr_copies: obj.nr_copies,
                            copy_policy: obj.copy_policy,
                            sha1,
                        }),
                        Err(err) => {
                            error!("failed to save object {:#018x}: {err}", obj.oid);
                            latch.set();
                            None
                        }
                    }
                };
                move || {
                    if let Some(entry) = entry {
                        slots.lock()[i] = Some(entry);
                        progress.tick();
                    }
                }
            });
        }
        wq.wait();
        if latch.is_set() {
            return Err(Error::Aborted("save snapshot"));
        }

        let entries: Vec<TrunkEntry> = slots
            .lock()
            .iter()
            .cloned()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Internal("trunk entry missing after save".to_string()))?;

        let trunk_sha1 = snap::trunk_file_write(&self.slices, &entries)?;
        let snap_sha1 = snap::snap_file_write(&self.slices, idx, &trunk_sha1)?;
        self.log.append(idx, tag, &snap_sha1)?;
        info!(idx, tag, objects = total, "snapshot saved");
        Ok(idx)
    }

    /// Restores the snapshot resolved by `(idx, tag)` into the block store
    /// and re-creates the active VDIs it captured.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be resolved, any object transfer fails
    /// or a VDI cannot be re-created.
    pub fn load_snapshot(&self, idx: u32, tag: &str) -> Result<()> {
        let trunk_sha1 = self.resolve_trunk(idx, tag)?;
        debug!(idx, tag, trunk = %hex::encode(trunk_sha1), "loading snapshot");

        let registry = Arc::new(RwLock::new(VdiRegistry::new()));
        let latch = ErrorLatch::new();
        let mut progress: Option<Arc<Progress>> = None;

        let mut wq = WorkQueue::new("load snapshot", Discipline::Dynamic, self.nr_workers)?;
        snap::for_each_trunk_entry(&self.slices, &trunk_sha1, |entry, total| {
            let progress = Arc::clone(progress.get_or_insert_with(|| Arc::new(Progress::new(total))));
            let store = Arc::clone(&self.store);
            let slices = self.slices.clone();
            let latch = latch.clone();
            let registry = Arc::clone(&registry);
            let entry = entry.clone();
            wq.queue(move || {
                let ok = if latch.is_set() {
                    false
                } else {
                    match load_object(store.as_ref(), &slices, &entry, &registry) {
                        Ok(()) => true,
                        Err(err) => {
                            error!("failed to load object {:#018x}: {err}", entry.oid);
                            latch.set();
                            false
                        }
                    }
                };
                move || {
                    if ok {
                        progress.tick();
                    }
                }
            });
            Ok(())
        })?;
        wq.wait();

        let result = if latch.is_set() {
            Err(Error::Aborted("load snapshot"))
        } else {
            registry.read().commit(self.store.as_ref())
        };
        registry.write().clear();
        if result.is_ok() {
            info!(idx, tag, "snapshot loaded");
        }
        result
    }
}

fn save_object(store: &dyn BlockStore, slices: &SliceStore, obj: &ObjectRef) -> Result<Digest> {
    let mut buf = vec![0u8; get_objsize(obj.oid)];
    store.read_object(obj.oid, &mut buf, 0)?;
    slices.write(&buf)
}

fn load_object(
    store: &dyn BlockStore,
    slices: &SliceStore,
    entry: &TrunkEntry,
    registry: &RwLock<VdiRegistry>,
) -> Result<()> {
    let buf = slices.read(&entry.sha1)?;
    store.write_object(
        entry.oid,
        &buf,
        0,
        &WriteOptions::create(entry.nr_copies, entry.copy_policy),
    )?;

    if is_vdi_obj(entry.oid) {
        store.notify_vdi_add(
            oid_to_vid(entry.oid),
            entry.nr_copies,
            entry.copy_policy,
            true,
        )?;
        let inode = VdiInode::decode(&buf)?;
        registry.write().insert(&inode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use tempfile::tempdir;

    fn mem() -> Arc<dyn BlockStore> {
        Arc::new(MemStore::new())
    }

    #[test]
    fn test_init_creates_shard_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("farm");
        let farm = Farm::init(&root, mem()).unwrap();

        assert!(root.join("snap_log").is_file());
        assert!(root.join("objects/00").is_dir());
        assert!(root.join("objects/a5").is_dir());
        assert!(root.join("objects/ff").is_dir());
        assert_eq!(farm.root(), root);
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("farm");
        Farm::init(&root, mem()).unwrap();

        let err = Farm::init(&root, mem()).unwrap_err();
        assert!(err.to_string().contains("not a directory"), "{err}");
    }

    #[test]
    fn test_open_requires_archive_layout() {
        let dir = tempdir().unwrap();
        assert!(Farm::open(dir.path().join("nope"), mem()).is_err());

        let root = dir.path().join("farm");
        Farm::init(&root, mem()).unwrap();
        assert!(Farm::open(&root, mem()).is_ok());
    }

    #[test]
    fn test_save_empty_cluster() {
        let dir = tempdir().unwrap();
        let farm = Farm::init(dir.path().join("farm"), mem()).unwrap();

        let idx = farm.save_snapshot("v0").unwrap();
        assert_eq!(idx, 1);
        assert!(farm.contain_snapshot(1, "v0"));
        assert!(!farm.contain_snapshot(2, "other"));
    }

    #[test]
    fn test_snapshot_resolution_matches_either_key() {
        let dir = tempdir().unwrap();
        let farm = Farm::init(dir.path().join("farm"), mem()).unwrap();
        farm.save_snapshot("alpha").unwrap();
        farm.save_snapshot("beta").unwrap();

        // Matching index with a bogus tag, and matching tag with a bogus
        // index, both resolve.
        assert!(farm.contain_snapshot(2, "no-such-tag"));
        assert!(farm.contain_snapshot(99, "alpha"));
        assert!(!farm.contain_snapshot(99, "no-such-tag"));
    }

    #[test]
    fn test_save_assigns_sequential_indices() {
        let dir = tempdir().unwrap();
        let farm = Farm::init(dir.path().join("farm"), mem()).unwrap();
        assert_eq!(farm.save_snapshot("a").unwrap(), 1);
        assert_eq!(farm.save_snapshot("b").unwrap(), 2);
        let entries = farm.snap_log().read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().enumerate().all(|(i, e)| e.idx == i as u32 + 1));
    }
}

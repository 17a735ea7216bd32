//! Tests for the `registry` module.

use std::collections::BTreeMap;

use super::registry::VdiRegistry;
use crate::store::inode::VdiInode;
use crate::store::traits::BlockStore;
use crate::store::MemStore;

fn inode(name: &str, vdi_id: u32, snap_id: u32, vdi_size: u64) -> VdiInode {
    VdiInode {
        name: name.to_string(),
        vdi_size,
        vdi_id,
        snap_id,
        nr_copies: 3,
        copy_policy: 0,
        store_policy: 0,
        data_vdi_id: BTreeMap::new(),
    }
}

#[test]
fn test_insert_records_first_version() {
    let mut reg = VdiRegistry::new();
    reg.insert(&inode("a", 1, 3, 100));

    assert_eq!(reg.len(), 1);
    assert_eq!(reg.get("a").unwrap().snap_id, 3);
}

#[test]
fn test_larger_snap_id_replaces() {
    let mut reg = VdiRegistry::new();
    reg.insert(&inode("a", 1, 3, 100));
    reg.insert(&inode("a", 2, 5, 200));

    let entry = reg.get("a").unwrap();
    assert_eq!(entry.snap_id, 5);
    assert_eq!(entry.vdi_id, 2);
    assert_eq!(entry.vdi_size, 200);
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_smaller_or_equal_snap_id_is_ignored() {
    let mut reg = VdiRegistry::new();
    reg.insert(&inode("a", 2, 5, 200));
    reg.insert(&inode("a", 1, 3, 100));
    reg.insert(&inode("a", 9, 5, 900));

    let entry = reg.get("a").unwrap();
    assert_eq!(entry.snap_id, 5);
    assert_eq!(entry.vdi_id, 2);
}

#[test]
fn test_commit_creates_one_vdi_per_name() {
    let store = MemStore::new();
    let mut reg = VdiRegistry::new();
    reg.insert(&inode("a", 1, 3, 100));
    reg.insert(&inode("a", 2, 5, 200));
    reg.insert(&inode("b", 7, 1, 700));

    reg.commit(&store).unwrap();

    let vid_a = store.vdi_lookup("a").unwrap();
    assert_eq!(store.inode_read(vid_a).unwrap().vdi_size, 200);
    assert!(store.vdi_lookup("b").is_ok());
}

#[test]
fn test_clear_releases_entries() {
    let mut reg = VdiRegistry::new();
    reg.insert(&inode("a", 1, 1, 100));
    assert!(!reg.is_empty());

    reg.clear();
    assert!(reg.is_empty());
    assert!(reg.get("a").is_none());
}

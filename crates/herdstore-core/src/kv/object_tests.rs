//! Tests for object operations.

use std::sync::Arc;

use super::record::ONODE_HDR_SIZE;
use super::{placement_hash, Kv};
use crate::error::Error;
use crate::kv::record::OnodeHdr;
use crate::store::geometry::{vid_to_data_oid, MAX_DATA_OBJS};
use crate::store::traits::{BlockStore, WriteOptions};
use crate::store::MemStore;

fn bucket_fixture() -> (Kv, Arc<MemStore>, String) {
    let store = Arc::new(MemStore::new());
    let kv = Kv::new(Arc::<MemStore>::clone(&store));
    kv.create_account("coly").unwrap();
    kv.create_bucket("coly", "jetta").unwrap();
    (kv, store, "coly/jetta".to_string())
}

#[test]
fn test_create_then_read_round_trips() {
    let (kv, _store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"hello").unwrap();
    assert_eq!(kv.read_object(&bucket, "k").unwrap(), b"hello");
}

#[test]
fn test_same_name_create_overwrites() {
    let (kv, _store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"a").unwrap();
    kv.create_object(&bucket, "k", b"bb").unwrap();
    assert_eq!(kv.read_object(&bucket, "k").unwrap(), b"bb");
}

#[test]
fn test_update_changes_body_and_mtime_keeps_ctime() {
    let (kv, store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"v1").unwrap();

    let vid = store.vdi_lookup(&bucket).unwrap();
    let idx = (placement_hash("k") % MAX_DATA_OBJS) as u32;
    let before = read_hdr(store.as_ref(), vid, idx);

    kv.update_object(&bucket, "k", b"version two").unwrap();
    assert_eq!(kv.read_object(&bucket, "k").unwrap(), b"version two");

    let after = read_hdr(store.as_ref(), vid, idx);
    assert_eq!(after.ctime, before.ctime);
    assert!(after.mtime >= before.mtime);
    assert_eq!(after.size, b"version two".len() as u64);
    assert_ne!(after.sha1, before.sha1);
}

fn read_hdr(store: &dyn BlockStore, vid: u32, idx: u32) -> OnodeHdr {
    let mut buf = vec![0u8; ONODE_HDR_SIZE];
    store
        .read_object(vid_to_data_oid(vid, idx), &mut buf, 0)
        .unwrap();
    OnodeHdr::decode(&buf).unwrap()
}

#[test]
fn test_update_missing_object_is_not_found() {
    let (kv, _store, bucket) = bucket_fixture();
    let err = kv.update_object(&bucket, "ghost", b"x").unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound { .. }), "{err}");
}

#[test]
fn test_deleted_object_is_invisible() {
    let (kv, _store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"data").unwrap();
    kv.delete_object(&bucket, "k").unwrap();

    assert!(matches!(
        kv.read_object(&bucket, "k"),
        Err(Error::ObjectNotFound { .. })
    ));

    let mut names = Vec::new();
    kv.list_objects(&bucket, |name| names.push(name.to_string()))
        .unwrap();
    assert!(names.is_empty());
}

#[test]
fn test_tombstoned_slot_is_reused_by_create() {
    let (kv, store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"one").unwrap();
    kv.delete_object(&bucket, "k").unwrap();
    kv.create_object(&bucket, "k", b"two").unwrap();

    assert_eq!(kv.read_object(&bucket, "k").unwrap(), b"two");
    // Reuse, not relocation: the slot at the hash start holds the object.
    let vid = store.vdi_lookup(&bucket).unwrap();
    let idx = (placement_hash("k") % MAX_DATA_OBJS) as u32;
    assert_eq!(read_hdr(store.as_ref(), vid, idx).name, "k");
}

#[test]
fn test_taken_slot_probes_forward() {
    let (kv, store, bucket) = bucket_fixture();
    let vid = store.vdi_lookup(&bucket).unwrap();

    // Occupy the hash slot of "x" with a different object's onode.
    let idx = (placement_hash("x") % MAX_DATA_OBJS) as u32;
    let squatter = OnodeHdr {
        name: "squatter".to_string(),
        sha1: [0; 20],
        size: 0,
        ctime: 1,
        mtime: 1,
        data_vid: 0,
        nr_extent: 0,
        inlined: true,
    };
    store
        .write_object(
            vid_to_data_oid(vid, idx),
            &squatter.encode().unwrap(),
            0,
            &WriteOptions::create(3, 0),
        )
        .unwrap();
    let mut inode = store.inode_read(vid).unwrap();
    inode.set_vid(idx, vid);
    store.inode_write_vid(&inode, idx, vid, vid).unwrap();

    kv.create_object(&bucket, "x", b"probed").unwrap();
    assert_eq!(kv.read_object(&bucket, "x").unwrap(), b"probed");

    // "x" landed one slot past its hash start.
    let next = ((placement_hash("x") % MAX_DATA_OBJS + 1) % MAX_DATA_OBJS) as u32;
    assert_eq!(read_hdr(store.as_ref(), vid, next).name, "x");
    // And the squatter is untouched.
    assert_eq!(read_hdr(store.as_ref(), vid, idx).name, "squatter");
}

#[test]
fn test_read_from_missing_bucket_is_no_vdi() {
    let (kv, _store, _bucket) = bucket_fixture();
    assert!(matches!(
        kv.read_object("coly/ghost", "k"),
        Err(Error::NoVdi(_))
    ));
}

#[test]
fn test_list_objects_emits_live_names() {
    let (kv, _store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "a", b"1").unwrap();
    kv.create_object(&bucket, "b", b"2").unwrap();
    kv.create_object(&bucket, "c", b"3").unwrap();
    kv.delete_object(&bucket, "b").unwrap();

    let mut names = Vec::new();
    kv.list_objects(&bucket, |name| names.push(name.to_string()))
        .unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn test_oversized_payload_is_not_implemented() {
    let (kv, _store, bucket) = bucket_fixture();
    let payload = vec![0u8; super::record::ONODE_INLINE_SIZE + 1];
    let err = kv.create_object(&bucket, "big", &payload).unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)), "{err}");
}

#[test]
fn test_etag_is_payload_sha1() {
    use sha1::{Digest as _, Sha1};

    let (kv, store, bucket) = bucket_fixture();
    kv.create_object(&bucket, "k", b"etag me").unwrap();

    let vid = store.vdi_lookup(&bucket).unwrap();
    let idx = (placement_hash("k") % MAX_DATA_OBJS) as u32;
    let hdr = read_hdr(store.as_ref(), vid, idx);
    let expected: [u8; 20] = Sha1::digest(b"etag me").into();
    assert_eq!(hdr.sha1, expected);
}

//! Tests for the `slice` module.

use super::slice::{sha1_digest, SliceStore};

use proptest::prelude::*;
use tempfile::TempDir;

fn create_test_store() -> (SliceStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let object_dir = temp_dir.path().join("objects");
    std::fs::create_dir(&object_dir).unwrap();
    for shard in 0..=0xffu32 {
        std::fs::create_dir(object_dir.join(format!("{shard:02x}"))).unwrap();
    }
    (SliceStore::new(object_dir), temp_dir)
}

fn shard_file_count(store: &SliceStore, digest: &[u8; 20]) -> usize {
    let shard = store.object_dir().join(format!("{:02x}", digest[0]));
    std::fs::read_dir(shard).unwrap().count()
}

#[test]
fn test_write_then_read_round_trips() {
    let (store, _temp) = create_test_store();
    let payload = b"the quick brown fox".to_vec();

    let digest = store.write(&payload).expect("write");
    assert_eq!(store.read(&digest).expect("read"), payload);
}

#[test]
fn test_slice_is_named_by_its_digest() {
    let (store, _temp) = create_test_store();
    let digest = store.write(b"abc").unwrap();

    assert_eq!(digest, sha1_digest(b"abc"));
    let path = store
        .object_dir()
        .join(format!("{:02x}", digest[0]))
        .join(hex::encode(digest));
    assert!(path.is_file());
}

#[test]
fn test_rewrite_is_idempotent() {
    let (store, _temp) = create_test_store();
    let first = store.write(b"same bytes").unwrap();
    let count_after_first = shard_file_count(&store, &first);

    let second = store.write(b"same bytes").unwrap();
    assert_eq!(first, second);
    assert_eq!(shard_file_count(&store, &first), count_after_first);
}

#[test]
fn test_missing_slice_is_corruption() {
    let (store, _temp) = create_test_store();
    let digest = sha1_digest(b"never stored");

    assert!(!store.contains(&digest));
    let err = store.read(&digest).unwrap_err();
    assert_eq!(err.code(), "HERD-009");
}

#[test]
fn test_empty_slice_round_trips() {
    let (store, _temp) = create_test_store();
    let digest = store.write(b"").unwrap();
    assert_eq!(store.read(&digest).unwrap(), Vec::<u8>::new());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_read_returns_written_bytes(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let (store, _temp) = create_test_store();
        let digest = store.write(&payload).unwrap();
        prop_assert_eq!(store.read(&digest).unwrap(), payload);
    }
}

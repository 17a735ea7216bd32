//! Tests for the `snap` module.

use super::slice::SliceStore;
use super::snap::{
    for_each_trunk_entry, snap_file_read, snap_file_write, trunk_file_write, SnapLog, TrunkEntry,
    MAX_TAG_LEN, SNAP_LOG_RECORD_SIZE, TRUNK_ENTRY_SIZE,
};

use tempfile::TempDir;

fn slice_fixture() -> (SliceStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let object_dir = temp_dir.path().join("objects");
    std::fs::create_dir(&object_dir).unwrap();
    for shard in 0..=0xffu32 {
        std::fs::create_dir(object_dir.join(format!("{shard:02x}"))).unwrap();
    }
    (SliceStore::new(object_dir), temp_dir)
}

fn log_fixture() -> (SnapLog, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let log = SnapLog::new(temp_dir.path().join("snap_log"));
    log.create().unwrap();
    (log, temp_dir)
}

fn entry(oid: u64, fill: u8) -> TrunkEntry {
    TrunkEntry {
        oid,
        nr_copies: 3,
        copy_policy: 0,
        sha1: [fill; 20],
    }
}

#[test]
fn test_record_sizes() {
    assert_eq!(SNAP_LOG_RECORD_SIZE, 280);
    assert_eq!(TRUNK_ENTRY_SIZE, 36);
}

#[test]
fn test_log_append_and_read_in_order() {
    let (log, _temp) = log_fixture();
    log.append(1, "first", &[0x11; 20]).unwrap();
    log.append(2, "second", &[0x22; 20]).unwrap();

    let entries = log.read_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].idx, 1);
    assert_eq!(entries[0].tag, "first");
    assert_eq!(entries[0].sha1, [0x11; 20]);
    assert_eq!(entries[1].idx, 2);
    assert_eq!(entries[1].tag, "second");
}

#[test]
fn test_log_rejects_overlong_tag() {
    let (log, _temp) = log_fixture();
    let tag = "t".repeat(MAX_TAG_LEN);
    let err = log.append(1, &tag, &[0; 20]).unwrap_err();
    assert_eq!(err.code(), "HERD-007");
}

#[test]
fn test_truncated_log_is_corrupt() {
    let (log, temp) = log_fixture();
    log.append(1, "ok", &[0; 20]).unwrap();

    let path = temp.path().join("snap_log");
    let mut raw = std::fs::read(&path).unwrap();
    raw.truncate(SNAP_LOG_RECORD_SIZE - 1);
    std::fs::write(&path, &raw).unwrap();

    let err = log.read_entries().unwrap_err();
    assert_eq!(err.code(), "HERD-009");
}

#[test]
fn test_snap_file_round_trips() {
    let (slices, _temp) = slice_fixture();
    let trunk_sha1 = [0xab; 20];

    let digest = snap_file_write(&slices, 7, &trunk_sha1).unwrap();
    let snap = snap_file_read(&slices, &digest).unwrap();
    assert_eq!(snap.idx, 7);
    assert_eq!(snap.trunk_sha1, trunk_sha1);
    assert!(snap.ctime > 0);
}

#[test]
fn test_snap_file_accepts_legacy_form_without_ctime() {
    let (slices, _temp) = slice_fixture();
    let mut raw = Vec::new();
    raw.extend_from_slice(&3u32.to_le_bytes());
    raw.extend_from_slice(&[0xcd; 20]);
    let digest = slices.write(&raw).unwrap();

    let snap = snap_file_read(&slices, &digest).unwrap();
    assert_eq!(snap.idx, 3);
    assert_eq!(snap.trunk_sha1, [0xcd; 20]);
    assert_eq!(snap.ctime, 0);
}

#[test]
fn test_trunk_stream_preserves_order_and_count() {
    let (slices, _temp) = slice_fixture();
    let entries = vec![entry(10, 1), entry(11, 2), entry(12, 3)];
    let digest = trunk_file_write(&slices, &entries).unwrap();

    let mut seen = Vec::new();
    let mut totals = Vec::new();
    for_each_trunk_entry(&slices, &digest, |e, total| {
        seen.push(e.clone());
        totals.push(total);
        Ok(())
    })
    .unwrap();

    assert_eq!(seen, entries);
    assert!(totals.iter().all(|&t| t == 3));
}

#[test]
fn test_empty_trunk_streams_nothing() {
    let (slices, _temp) = slice_fixture();
    let digest = trunk_file_write(&slices, &[]).unwrap();

    let mut calls = 0;
    for_each_trunk_entry(&slices, &digest, |_, _| {
        calls += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(calls, 0);
}

#[test]
fn test_trunk_length_mismatch_is_corrupt() {
    let (slices, _temp) = slice_fixture();
    let mut raw = Vec::new();
    raw.extend_from_slice(&2u64.to_le_bytes());
    raw.extend_from_slice(&[0u8; TRUNK_ENTRY_SIZE]); // one entry, claims two
    let digest = slices.write(&raw).unwrap();

    let err = for_each_trunk_entry(&slices, &digest, |_, _| Ok(())).unwrap_err();
    assert_eq!(err.code(), "HERD-009");
}

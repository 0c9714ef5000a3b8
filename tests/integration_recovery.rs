//! WAL crash-recovery scenarios spanning the WAL and memtable modules.
//!
//! `strata` itself has no orchestrator to drive "open the database and
//! replay every WAL generation" — that loop belongs to the out-of-scope
//! top-level DB (see `spec.md` §7 "Recovery"). These tests instead play the
//! orchestrator's part directly: write a WAL, truncate or corrupt it the
//! way a crash would, then replay what's left into a fresh memtable and
//! check the reconstructed state.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use tempfile::tempdir;

use strata::error::Error;
use strata::key::{encode_internal, OpType};
use strata::memtable::Memtable;
use strata::wal::{self, ReadOutcome, WalReader, WalWriter};

/// Replays every record a `WalReader` yields into a fresh, WAL-less
/// memtable, stopping at the first `Eof` — the same replay loop an
/// orchestrator runs on open.
fn replay_into_fresh_memtable(reader: &mut WalReader) -> Memtable {
    let mt = Memtable::new(None, false);
    loop {
        match reader.read_record().unwrap() {
            ReadOutcome::Record(payload) => {
                let (ik, v) = wal::decode_kv_payload(&payload).unwrap();
                mt.put(ik, v).unwrap();
            }
            ReadOutcome::Eof => break,
        }
    }
    mt
}

/// S5: append three records, truncate the file mid-write of the third (the
/// same shape a crash between the header write and the payload write
/// leaves behind), then replay. The memtable after recovery must reflect
/// only the first two records.
#[test]
fn s5_truncated_final_record_recovers_a_consistent_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("7.wal");

    let r1 = (encode_internal(b"k1", 1, OpType::Put), b"v1".to_vec());
    let r2 = (encode_internal(b"k2", 2, OpType::Put), b"v2".to_vec());
    let r3 = (encode_internal(b"k3", 3, OpType::Put), b"v3".to_vec());

    let mut writer = WalWriter::create(&path).unwrap();
    for (ik, v) in [&r1, &r2] {
        writer.add_record(&wal::encode_kv_payload(ik, v)).unwrap();
    }
    writer.close().unwrap();

    // Simulate a crash partway through writing r3's record.
    let full_r3 = wal::encode_kv_payload(&r3.0, &r3.1);
    let crc = crc32fast::hash(&full_r3);
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&crc.to_le_bytes());
    header[4..8].copy_from_slice(&0u32.to_le_bytes());
    header[8..12].copy_from_slice(&(full_r3.len() as u32).to_le_bytes());
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&header).unwrap();
    file.write_all(&full_r3[..full_r3.len() / 2]).unwrap();
    drop(file);

    let mut reader = WalReader::open(&path).unwrap();
    let mt = replay_into_fresh_memtable(&mut reader);

    assert_eq!(mt.get(b"k1", u64::MAX).unwrap().unwrap(), b"v1");
    assert_eq!(mt.get(b"k2", u64::MAX).unwrap().unwrap(), b"v2");
    assert!(mt.get(b"k3", u64::MAX).unwrap().is_none());
}

/// A bit flip inside a complete record must stop replay with a checksum
/// error rather than silently reconstructing the wrong value, and records
/// before the corruption must still have been applied.
#[test]
fn corrupted_record_stops_replay_without_losing_earlier_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("8.wal");

    let r1 = (encode_internal(b"k1", 1, OpType::Put), b"v1".to_vec());
    let r2 = (encode_internal(b"k2", 2, OpType::Put), b"v2".to_vec());

    let mut writer = WalWriter::create(&path).unwrap();
    writer
        .add_record(&wal::encode_kv_payload(&r1.0, &r1.1))
        .unwrap();
    let r2_offset_marker = {
        // Position right after r1's record, where r2's header begins.
        std::fs::metadata(&path).unwrap().len()
    };
    writer
        .add_record(&wal::encode_kv_payload(&r2.0, &r2.1))
        .unwrap();
    writer.close().unwrap();

    // Flip a byte inside r2's payload, past its header.
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(r2_offset_marker + 12)).unwrap();
    file.write_all(&[0xffu8]).unwrap();
    drop(file);

    let mt = Memtable::new(None, false);
    let mut reader = WalReader::open(&path).unwrap();

    match reader.read_record().unwrap() {
        ReadOutcome::Record(payload) => {
            let (ik, v) = wal::decode_kv_payload(&payload).unwrap();
            mt.put(ik, v).unwrap();
        }
        ReadOutcome::Eof => panic!("expected r1 before the corrupted record"),
    }

    assert!(matches!(reader.read_record(), Err(Error::ChecksumMismatch)));
    assert_eq!(mt.get(b"k1", u64::MAX).unwrap().unwrap(), b"v1");
    assert!(mt.get(b"k2", u64::MAX).unwrap().is_none());
}

/// A full `put_tee_wal` → crash → reopen → replay cycle across the real
/// `WalWriter`/`WalReader`/`Memtable` trio, without any corruption — the
/// clean-shutdown companion to the truncation scenario above.
#[test]
fn clean_shutdown_replay_reconstructs_the_full_memtable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("9.wal");

    let original = Memtable::new(Some(WalWriter::create(&path).unwrap()), true);
    for i in 0..50u64 {
        let ik = encode_internal(format!("k{i}").as_bytes(), i + 1, OpType::Put);
        original.put_tee_wal(&ik, format!("v{i}").as_bytes()).unwrap();
    }
    // Delete one key; its tombstone must also survive replay.
    original
        .put_tee_wal(&encode_internal(b"k10", 51, OpType::Delete), b"")
        .unwrap();
    // Dropping `original` without calling `drop_wal` syncs and closes the
    // WAL but does not unlink it, leaving the file in place for replay —
    // the same state a crash (no orchestrator ever reaching `drop_wal`)
    // would leave behind.
    drop(original);

    let mut reader = WalReader::open(&path).unwrap();
    let replayed = replay_into_fresh_memtable(&mut reader);

    for i in 0..50u64 {
        if i == 10 {
            assert!(replayed.get(b"k10", u64::MAX).unwrap().is_none());
            continue;
        }
        let key = format!("k{i}");
        assert_eq!(
            replayed.get(key.as_bytes(), u64::MAX).unwrap().unwrap(),
            format!("v{i}").as_bytes()
        );
    }
}

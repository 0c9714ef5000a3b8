use std::sync::Arc;

use super::*;
use crate::key::{encode_internal, OpType};

fn ik(user_key: &[u8], seq: u64) -> Vec<u8> {
    encode_internal(user_key, seq, OpType::Put)
}

fn build(pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut w = BlockWriter::new();
    for (k, v) in pairs {
        w.add(k, v).unwrap();
    }
    w.finalize()
}

#[test]
fn round_trip_small_block() {
    let pairs = vec![
        (ik(b"a", 1), b"1".to_vec()),
        (ik(b"ab", 1), b"2".to_vec()),
        (ik(b"abc", 1), b"3".to_vec()),
    ];
    let raw = build(&pairs);
    let reader = BlockReader::parse(raw).unwrap();

    for (k, v) in &pairs {
        let (got_k, got_v) = reader.get(k).unwrap().expect("key present");
        assert_eq!(&got_k, k);
        assert_eq!(&got_v, v);
    }
}

#[test]
fn prefix_compression_does_not_corrupt_keys() {
    // "a" then "ab": the second record shares one byte with the first.
    let pairs = vec![(ik(b"a", 1), b"1".to_vec()), (ik(b"ab", 1), b"2".to_vec())];
    let raw = build(&pairs);
    let reader = BlockReader::parse(raw).unwrap();

    let (k0, v0) = reader.get(&pairs[0].0).unwrap().unwrap();
    assert_eq!(k0, pairs[0].0);
    assert_eq!(v0, b"1");

    let (k1, v1) = reader.get(&pairs[1].0).unwrap().unwrap();
    assert_eq!(k1, pairs[1].0);
    assert_eq!(v1, b"2");
}

#[test]
fn get_is_lower_bound_not_exact_match() {
    let pairs = vec![
        (ik(b"apple", 1), b"1".to_vec()),
        (ik(b"cherry", 1), b"2".to_vec()),
    ];
    let raw = build(&pairs);
    let reader = BlockReader::parse(raw).unwrap();

    // "banana" sits strictly between the two keys; lower bound is "cherry".
    let probe = ik(b"banana", 1);
    let (got_k, got_v) = reader.get(&probe).unwrap().unwrap();
    assert_eq!(got_k, pairs[1].0);
    assert_eq!(got_v, b"2");

    // Past every key: no lower bound exists.
    let probe = ik(b"zzz", 1);
    assert!(reader.get(&probe).unwrap().is_none());
}

#[test]
fn get_spans_multiple_restart_runs() {
    let mut pairs = Vec::new();
    for i in 0..(RESTART_INTERVAL * 3 + 5) {
        let user_key = format!("key-{:05}", i);
        pairs.push((ik(user_key.as_bytes(), 1), format!("v{i}").into_bytes()));
    }
    let raw = build(&pairs);
    let reader = BlockReader::parse(raw).unwrap();

    for (k, v) in &pairs {
        let (got_k, got_v) = reader.get(k).unwrap().expect("key present");
        assert_eq!(&got_k, k);
        assert_eq!(&got_v, v);
    }
}

#[test]
fn get_works_right_at_a_restart_boundary() {
    let mut pairs = Vec::new();
    for i in 0..(RESTART_INTERVAL * 2) {
        let user_key = format!("k{i:03}");
        pairs.push((ik(user_key.as_bytes(), 1), b"v".to_vec()));
    }
    let raw = build(&pairs);
    let reader = BlockReader::parse(raw).unwrap();

    // Index RESTART_INTERVAL is itself a restart point; exercise it directly.
    let boundary = &pairs[RESTART_INTERVAL];
    let (got_k, got_v) = reader.get(&boundary.0).unwrap().unwrap();
    assert_eq!(got_k, boundary.0);
    assert_eq!(got_v, boundary.1);
}

#[test]
fn writer_rejects_out_of_order_keys() {
    let mut w = BlockWriter::new();
    w.add(&ik(b"b", 1), b"1").unwrap();
    assert!(w.add(&ik(b"a", 1), b"2").is_err());
    assert!(w.add(&ik(b"b", 1), b"2").is_err());
}

#[test]
fn writer_orders_by_internal_key_not_raw_bytes() {
    // "a" followed by "ab" with a high seq on "a": the little-endian seq
    // suffix makes the *raw bytes* of ik("a", 200) greater than ik("ab", 1),
    // even though "a" < "ab" under cmp_internal. The writer must accept
    // this as ascending and the reader must still resolve both keys.
    let mut w = BlockWriter::new();
    let k0 = ik(b"a", 200);
    let k1 = ik(b"ab", 1);
    assert!(k0.as_slice() > k1.as_slice(), "test setup: bytes must disagree with cmp_internal");
    w.add(&k0, b"1").unwrap();
    w.add(&k1, b"2").unwrap();

    let reader = BlockReader::parse(w.finalize()).unwrap();
    assert_eq!(reader.get(&k0).unwrap().unwrap(), (k0, b"1".to_vec()));
    assert_eq!(reader.get(&k1).unwrap().unwrap(), (k1, b"2".to_vec()));
}

#[test]
fn iterator_walks_all_records_in_order() {
    let pairs = vec![
        (ik(b"a", 1), b"1".to_vec()),
        (ik(b"ab", 1), b"2".to_vec()),
        (ik(b"b", 1), b"3".to_vec()),
    ];
    let raw = build(&pairs);
    let reader = Arc::new(BlockReader::parse(raw).unwrap());
    let mut it = reader.iter();

    let mut seen = Vec::new();
    it.advance().unwrap();
    while it.valid() {
        let (k, v) = it.fetch().unwrap();
        seen.push((k.to_vec(), v.to_vec()));
        it.advance().unwrap();
    }
    assert_eq!(seen, pairs);
}

#[test]
fn iterator_fetch_is_idempotent_and_none_when_invalid() {
    let pairs = vec![(ik(b"a", 1), b"1".to_vec())];
    let raw = build(&pairs);
    let reader = Arc::new(BlockReader::parse(raw).unwrap());
    let mut it = reader.iter();
    assert!(it.fetch().is_none());

    it.advance().unwrap();
    assert_eq!(it.fetch(), it.fetch());

    it.advance().unwrap();
    assert!(!it.valid());
    assert!(it.fetch().is_none());
}

#[test]
fn empty_block_get_returns_none() {
    let w = BlockWriter::new();
    let raw = w.finalize();
    let reader = BlockReader::parse(raw).unwrap();
    assert!(reader.get(&ik(b"anything", 1)).unwrap().is_none());
}

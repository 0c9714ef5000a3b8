use super::*;

#[test]
fn encode_decode_round_trip() {
    let k = encode_internal(b"apple", 42, OpType::Put);
    let (uk, seq, op) = decode_internal(&k).unwrap();
    assert_eq!(uk, b"apple");
    assert_eq!(seq, 42);
    assert_eq!(op, OpType::Put);
}

#[test]
fn decode_rejects_short_buffers() {
    assert!(decode_internal(b"12345678").is_err());
    assert!(decode_internal(b"").is_err());
}

#[test]
fn ascending_by_user_key() {
    let a = encode_internal(b"apple", 1, OpType::Put);
    let b = encode_internal(b"banana", 1, OpType::Put);
    assert_eq!(cmp_internal(&a, &b), std::cmp::Ordering::Less);
}

#[test]
fn descending_by_seq_for_equal_user_key() {
    let newer = encode_internal(b"apple", 5, OpType::Put);
    let older = encode_internal(b"apple", 1, OpType::Put);
    assert_eq!(cmp_internal(&newer, &older), std::cmp::Ordering::Less);
}

#[test]
fn delete_sorts_before_put_at_equal_user_key_and_seq() {
    let del = encode_internal(b"apple", 3, OpType::Delete);
    let put = encode_internal(b"apple", 3, OpType::Put);
    assert_eq!(cmp_internal(&del, &put), std::cmp::Ordering::Less);
    assert_eq!(cmp_internal(&put, &del), std::cmp::Ordering::Greater);
}

#[test]
fn cmp_user_of_internal_ignores_seq_and_type() {
    let a = encode_internal(b"apple", 99, OpType::Delete);
    let b = encode_internal(b"apple", 1, OpType::Put);
    assert_eq!(cmp_user_of_internal(&a, &b), std::cmp::Ordering::Equal);
}

#[test]
fn min_internal_for_sorts_after_every_real_version_of_a_key() {
    let boundary = min_internal_for(b"apple");
    let any_version = encode_internal(b"apple", 1, OpType::Put);
    assert_eq!(
        cmp_internal(&boundary, &any_version),
        std::cmp::Ordering::Greater
    );
    let next_user_key = encode_internal(b"banana", 1, OpType::Put);
    assert_eq!(
        cmp_internal(&boundary, &next_user_key),
        std::cmp::Ordering::Less
    );
}

#[test]
fn probe_for_sorts_at_or_before_every_real_version_at_the_snapshot_seq() {
    let probe = probe_for(b"apple", 5);
    let put_at_snapshot = encode_internal(b"apple", 5, OpType::Put);
    let delete_at_snapshot = encode_internal(b"apple", 5, OpType::Delete);
    assert_eq!(
        cmp_internal(&probe, &put_at_snapshot),
        std::cmp::Ordering::Less
    );
    assert_eq!(
        cmp_internal(&probe, &delete_at_snapshot),
        std::cmp::Ordering::Equal
    );
}

#[test]
fn probe_for_respects_snapshot_seq() {
    // With a snapshot of 3, a lower-bound search for probe_for("apple", 3)
    // must land on the seq=3 write, not the seq=5 write that postdates the
    // snapshot.
    let probe = probe_for(b"apple", 3);
    let at_snapshot = encode_internal(b"apple", 3, OpType::Put);
    let after_snapshot = encode_internal(b"apple", 5, OpType::Put);
    assert_eq!(cmp_internal(&probe, &at_snapshot), std::cmp::Ordering::Less);
    assert_eq!(
        cmp_internal(&probe, &after_snapshot),
        std::cmp::Ordering::Greater
    );
}

#[test]
fn save_if_user_key_matches_returns_value_for_put() {
    let rk = encode_internal(b"apple", 1, OpType::Put);
    let rv = b"red".to_vec();
    let result = save_if_user_key_matches(&rk, &rv, b"apple");
    assert_eq!(result, Some((rk.as_slice(), rv.as_slice())));
}

#[test]
fn save_if_user_key_matches_returns_none_for_delete() {
    let rk = encode_internal(b"apple", 1, OpType::Delete);
    let result = save_if_user_key_matches(&rk, b"", b"apple");
    assert_eq!(result, None);
}

#[test]
fn save_if_user_key_matches_returns_none_on_mismatch() {
    let rk = encode_internal(b"apple", 1, OpType::Put);
    let result = save_if_user_key_matches(&rk, b"red", b"banana");
    assert_eq!(result, None);
}

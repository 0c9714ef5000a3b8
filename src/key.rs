//! Internal-key codec.
//!
//! User keys are opaque byte strings. Internally every write is wrapped with
//! a monotonically increasing sequence number and an operation tag to form an
//! *internal key*:
//!
//! ```text
//! internal_key = user_key || seq(8 LE) || type(1)
//! ```
//!
//! Internal keys define the system's total order: ascending by `user_key`;
//! for equal `user_key`, descending by `seq` (newer versions sort first); for
//! equal `(user_key, seq)`, [`OpType::Delete`] sorts before [`OpType::Put`].
//!
//! `OpType::Put as u8 == 0`, `OpType::Delete as u8 == 1`; the tie-break falls
//! out of `(other.type as i32) - (self.type as i32)` matching the source this
//! was ported from, which compares operator tags directly rather than special
//! casing the equal-seq branch.

use crate::error::{Error, Result};

/// The suffix appended to every user key: 8 bytes of sequence number plus a
/// 1-byte operation tag.
pub const SUFFIX_LEN: usize = 9;

/// The operation a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpType {
    Put = 0,
    Delete = 1,
}

impl OpType {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(OpType::Put),
            1 => Ok(OpType::Delete),
            other => Err(Error::InvalidArgument(format!(
                "invalid internal key op type byte: {other}"
            ))),
        }
    }
}

/// Concatenates `user_key || seq(8 LE) || type(1)` into a new buffer.
pub fn encode_internal(user_key: &[u8], seq: u64, op: OpType) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_key.len() + SUFFIX_LEN);
    out.extend_from_slice(user_key);
    out.extend_from_slice(&seq.to_le_bytes());
    out.push(op as u8);
    out
}

/// Splits an internal key into its `(user_key, seq, type)` components.
///
/// Fails with [`Error::InvalidArgument`] if `bytes` is shorter than
/// [`SUFFIX_LEN`].
pub fn decode_internal(bytes: &[u8]) -> Result<(&[u8], u64, OpType)> {
    if bytes.len() < SUFFIX_LEN {
        return Err(Error::InvalidArgument(format!(
            "internal key too short: {} bytes, need at least {SUFFIX_LEN}",
            bytes.len()
        )));
    }
    let split = bytes.len() - SUFFIX_LEN;
    let user_key = &bytes[..split];
    let mut seq_bytes = [0u8; 8];
    seq_bytes.copy_from_slice(&bytes[split..split + 8]);
    let seq = u64::from_le_bytes(seq_bytes);
    let op = OpType::from_byte(bytes[split + 8])?;
    Ok((user_key, seq, op))
}

/// Returns only the user-key prefix of an internal key.
///
/// Fails with [`Error::InvalidArgument`] if `bytes` is shorter than
/// [`SUFFIX_LEN`].
pub fn user_key_of(bytes: &[u8]) -> Result<&[u8]> {
    decode_internal(bytes).map(|(k, _, _)| k)
}

/// Three-way compare of two internal keys under the ordering defined above.
pub fn cmp_internal(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let (ua, seq_a, op_a) = match decode_internal(a) {
        Ok(v) => v,
        Err(_) => return a.cmp(b),
    };
    let (ub, seq_b, op_b) = match decode_internal(b) {
        Ok(v) => v,
        Err(_) => return a.cmp(b),
    };

    match ua.cmp(ub) {
        Ordering::Equal => {}
        other => return other,
    }
    // Larger seq sorts first (newer versions precede older ones).
    match seq_b.cmp(&seq_a) {
        Ordering::Equal => {}
        other => return other,
    }
    // Equal user_key and seq: DELETE sorts before PUT.
    (op_b as i32).cmp(&(op_a as i32))
}

/// Compares only the user-key prefixes of two internal keys.
pub fn cmp_user_of_internal(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    let ua = user_key_of(a).unwrap_or(a);
    let ub = user_key_of(b).unwrap_or(b);
    ua.cmp(ub)
}

/// Builds the internal key `(user_key, seq = 0, type = PUT)`.
///
/// `seq = 0` is the smallest possible sequence number, which under
/// [`cmp_internal`]'s descending-seq rule makes this the *last*-sorting
/// internal key among all real versions of `user_key` (every actual write
/// carries a seq of at least 1). A lower-bound search for this probe skips
/// past every version of `user_key` and lands on the next distinct user key,
/// which makes it useful as an end-of-range boundary when scanning.
pub fn min_internal_for(user_key: &[u8]) -> Vec<u8> {
    encode_internal(user_key, 0, OpType::Put)
}

/// Builds the internal key `(user_key, snapshot_seq, type = DELETE)`, the
/// probe a point lookup searches for.
///
/// Under [`cmp_internal`]'s ordering this is the smallest possible internal
/// key for `user_key` within the `seq <= snapshot_seq` group: DELETE ties
/// break before PUT at equal seq, so the probe sorts at or before a real
/// record of either type at `snapshot_seq`, while every record with a seq
/// greater than `snapshot_seq` sorts strictly before the probe (larger seq
/// sorts first) and every record with a smaller seq sorts strictly after it.
/// A lower-bound search for this probe therefore lands exactly on the
/// newest version of `user_key` visible at `snapshot_seq` — DELETE or PUT —
/// if one exists. Pass `u64::MAX` to see the latest write regardless of seq.
///
/// This is distinct from [`min_internal_for`], whose fixed `seq = 0` makes it
/// sort *after* every real version of `user_key` rather than at the head of
/// a snapshot window.
pub fn probe_for(user_key: &[u8], snapshot_seq: u64) -> Vec<u8> {
    encode_internal(user_key, snapshot_seq, OpType::Delete)
}

/// If `rk`'s user-key prefix matches `target_user_key` and `rk`'s type is
/// `PUT`, returns `(rk, rv)`. Returns `None` on a user-key mismatch or on a
/// `DELETE` tombstone (which shadows any older version of the same key).
pub fn save_if_user_key_matches<'a>(
    rk: &'a [u8],
    rv: &'a [u8],
    target_user_key: &[u8],
) -> Option<(&'a [u8], &'a [u8])> {
    let (uk, _, op) = decode_internal(rk).ok()?;
    if uk != target_user_key {
        return None;
    }
    if op == OpType::Delete {
        return None;
    }
    Some((rk, rv))
}

#[cfg(test)]
mod tests;

//! The five-variant per-chunk codec and its transition automaton (§4.2).
//!
//! A chunk blob is a `Vec<u8>` laid out as:
//!
//! ```text
//! byte 0        : variant tag
//! bytes 1..k    : (SPARSE_SET / SPARSE_UNSET only) LEB128 count
//! bytes k..end  : payload (empty / packed 13-bit list / 1024-byte bitmap)
//! ```
//!
//! Everything outside this module treats a blob as opaque bytes and only
//! ever calls through the functions here — the tag byte is never inspected
//! by `bitset.rs`, `algebra.rs`, `rank_select.rs`, `iter.rs`, or
//! `similarity.rs`. This is the "sum type, pattern-matched in one place"
//! shape called for by the redesign notes, even though the storage itself
//! stays a flat byte buffer so that chunk size tracks chunk information
//! content.

use crate::{packed_list, varint, DENSE_BYTES, M, W};

pub(crate) const TAG_ALL_1: u8 = 1;
pub(crate) const TAG_SPARSE_SET: u8 = 2;
pub(crate) const TAG_DENSE_BITMAP: u8 = 3;
pub(crate) const TAG_SPARSE_UNSET: u8 = 4;

/// The five representations a chunk can take. `AllZero` is never stored —
/// it is represented by the chunk's absence from the entry map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    AllOne,
    SparseSet,
    Dense,
    SparseUnset,
}

pub fn variant(blob: &[u8]) -> Variant {
    match blob[0] {
        TAG_ALL_1 => Variant::AllOne,
        TAG_SPARSE_SET => Variant::SparseSet,
        TAG_DENSE_BITMAP => Variant::Dense,
        TAG_SPARSE_UNSET => Variant::SparseUnset,
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// Result of clearing a bit: whether the bit had been set, and whether the
/// chunk is now entirely empty (in which case the caller must remove the
/// entry from the entry map — `clear` never does that itself, since only
/// the container knows about the entry map).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearResult {
    pub previously_set: bool,
    pub now_empty: bool,
}

/// A brand-new chunk blob holding a single set offset.
pub fn single(offset: u16) -> Vec<u8> {
    build_sparse_blob(TAG_SPARSE_SET, &[offset])
}

/// A brand-new fully-set chunk blob.
pub fn all_ones() -> Vec<u8> {
    vec![TAG_ALL_1]
}

pub fn population(blob: &[u8]) -> u64 {
    match blob[0] {
        TAG_ALL_1 => W,
        TAG_SPARSE_SET => sparse_payload(blob).0 as u64,
        TAG_DENSE_BITMAP => popcount_bytes(dense_payload(blob)) as u64,
        TAG_SPARSE_UNSET => W - sparse_payload(blob).0 as u64,
        other => panic!("unknown chunk variant tag {other}"),
    }
}

pub fn test(blob: &[u8], offset: u16) -> bool {
    match blob[0] {
        TAG_ALL_1 => true,
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            packed_list::member(packed, count as usize, offset).is_ok()
        }
        TAG_DENSE_BITMAP => get_bit(dense_payload(blob), offset),
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            packed_list::member(packed, count as usize, offset).is_err()
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// Sets `offset`, returning whether it was already set. Mutates `blob` in
/// place, possibly replacing it with a differently-sized blob of a
/// different variant (§4.2's transition automaton).
pub fn set(blob: &mut Vec<u8>, offset: u16) -> bool {
    match blob[0] {
        TAG_ALL_1 => true,
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            let n = count as usize;
            if packed_list::member(packed, n, offset).is_ok() {
                return true;
            }
            let mut offsets: Vec<u16> = (0..n).map(|i| packed_list::get(packed, i)).collect();
            let at = offsets.partition_point(|&v| v < offset);
            offsets.insert(at, offset);
            if offsets.len() as u64 <= M {
                *blob = build_sparse_blob(TAG_SPARSE_SET, &offsets);
            } else {
                let mut dense = [0u8; DENSE_BYTES];
                for &v in &offsets {
                    set_bit(&mut dense, v);
                }
                *blob = build_dense_blob(&dense);
            }
            false
        }
        TAG_DENSE_BITMAP => {
            let was;
            let pop_after;
            {
                let dense = &mut blob[1..1 + DENSE_BYTES];
                let byte_i = (offset / 8) as usize;
                let bit = 1u8 << (offset % 8);
                was = dense[byte_i] & bit != 0;
                if !was {
                    dense[byte_i] |= bit;
                }
                pop_after = popcount_bytes(dense) as u64;
            }
            if !was {
                if pop_after == W {
                    *blob = all_ones();
                } else if pop_after >= W - M {
                    let mut copy = [0u8; DENSE_BYTES];
                    copy.copy_from_slice(&blob[1..1 + DENSE_BYTES]);
                    *blob = build_sparse_blob(TAG_SPARSE_UNSET, &ctz_scan_unset(&copy));
                }
            }
            was
        }
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let n = count as usize;
            match packed_list::member(packed, n, offset) {
                Err(_) => true,
                Ok(idx) => {
                    let mut unset: Vec<u16> = (0..n).map(|i| packed_list::get(packed, i)).collect();
                    unset.remove(idx);
                    if unset.is_empty() {
                        *blob = all_ones();
                    } else {
                        *blob = build_sparse_blob(TAG_SPARSE_UNSET, &unset);
                    }
                    false
                }
            }
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// Clears `offset`. See [`ClearResult`] for how chunk deletion is signalled.
pub fn clear(blob: &mut Vec<u8>, offset: u16) -> ClearResult {
    match blob[0] {
        TAG_ALL_1 => {
            // The automaton always routes ALL_1's clear through DENSE_BITMAP
            // first, even though the resulting population (W - 1) would
            // also satisfy SPARSE_UNSET's density rule — the single
            // documented hysteresis exception in §4.2.
            let mut dense = [0xFFu8; DENSE_BYTES];
            clear_bit(&mut dense, offset);
            *blob = build_dense_blob(&dense);
            ClearResult {
                previously_set: true,
                now_empty: false,
            }
        }
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            let n = count as usize;
            match packed_list::member(packed, n, offset) {
                Err(_) => ClearResult {
                    previously_set: false,
                    now_empty: false,
                },
                Ok(idx) => {
                    if n == 1 {
                        ClearResult {
                            previously_set: true,
                            now_empty: true,
                        }
                    } else {
                        let mut offsets: Vec<u16> =
                            (0..n).map(|i| packed_list::get(packed, i)).collect();
                        offsets.remove(idx);
                        *blob = build_sparse_blob(TAG_SPARSE_SET, &offsets);
                        ClearResult {
                            previously_set: true,
                            now_empty: false,
                        }
                    }
                }
            }
        }
        TAG_DENSE_BITMAP => {
            let was;
            let pop_after;
            {
                let dense = &mut blob[1..1 + DENSE_BYTES];
                let byte_i = (offset / 8) as usize;
                let bit = 1u8 << (offset % 8);
                was = dense[byte_i] & bit != 0;
                if was {
                    dense[byte_i] &= !bit;
                }
                pop_after = popcount_bytes(dense) as u64;
            }
            if was {
                if pop_after == 0 {
                    return ClearResult {
                        previously_set: true,
                        now_empty: true,
                    };
                } else if pop_after < M / 2 {
                    let mut copy = [0u8; DENSE_BYTES];
                    copy.copy_from_slice(&blob[1..1 + DENSE_BYTES]);
                    *blob = build_sparse_blob(TAG_SPARSE_SET, &ctz_scan_set(&copy));
                }
            }
            ClearResult {
                previously_set: was,
                now_empty: false,
            }
        }
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let n = count as usize;
            match packed_list::member(packed, n, offset) {
                Ok(_) => ClearResult {
                    previously_set: false,
                    now_empty: false,
                },
                Err(_) => {
                    let mut unset: Vec<u16> = (0..n).map(|i| packed_list::get(packed, i)).collect();
                    let at = unset.partition_point(|&v| v < offset);
                    unset.insert(at, offset);
                    if unset.len() as u64 > M {
                        let mut dense = [0xFFu8; DENSE_BYTES];
                        for &v in &unset {
                            clear_bit(&mut dense, v);
                        }
                        *blob = build_dense_blob(&dense);
                    } else {
                        *blob = build_sparse_blob(TAG_SPARSE_UNSET, &unset);
                    }
                    ClearResult {
                        previously_set: true,
                        now_empty: false,
                    }
                }
            }
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

pub fn expand_into(blob: &[u8], out: &mut [u8; DENSE_BYTES]) {
    match blob[0] {
        TAG_ALL_1 => out.fill(0xFF),
        TAG_SPARSE_SET => {
            out.fill(0);
            let (count, packed) = sparse_payload(blob);
            for i in 0..count as usize {
                set_bit(out, packed_list::get(packed, i));
            }
        }
        TAG_DENSE_BITMAP => out.copy_from_slice(dense_payload(blob)),
        TAG_SPARSE_UNSET => {
            out.fill(0xFF);
            let (count, packed) = sparse_payload(blob);
            for i in 0..count as usize {
                clear_bit(out, packed_list::get(packed, i));
            }
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// Picks the smallest valid variant for a freshly combined dense bitmap.
/// Returns `None` when the bitmap is all-zero (caller deletes the chunk).
pub fn compress_from(bitmap: &[u8; DENSE_BYTES]) -> Option<Vec<u8>> {
    let pop = popcount_bytes(bitmap) as u64;
    if pop == 0 {
        None
    } else if pop == W {
        Some(all_ones())
    } else if pop <= M {
        Some(build_sparse_blob(TAG_SPARSE_SET, &ctz_scan_set(bitmap)))
    } else if pop >= W - M {
        Some(build_sparse_blob(TAG_SPARSE_UNSET, &ctz_scan_unset(bitmap)))
    } else {
        Some(build_dense_blob(bitmap))
    }
}

pub fn first_set_offset(blob: &[u8]) -> Option<u16> {
    match blob[0] {
        TAG_ALL_1 => Some(0),
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            (count > 0).then(|| packed_list::get(packed, 0))
        }
        TAG_DENSE_BITMAP => ctz_first_set(dense_payload(blob)),
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let mut candidate: u16 = 0;
            for i in 0..count as usize {
                if packed_list::get(packed, i) == candidate {
                    candidate += 1;
                } else {
                    break;
                }
            }
            Some(candidate)
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

pub fn last_set_offset(blob: &[u8]) -> Option<u16> {
    match blob[0] {
        TAG_ALL_1 => Some((W - 1) as u16),
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            (count > 0).then(|| packed_list::get(packed, count as usize - 1))
        }
        TAG_DENSE_BITMAP => ctz_last_set(dense_payload(blob)),
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let mut candidate: u16 = (W - 1) as u16;
            for i in (0..count as usize).rev() {
                if packed_list::get(packed, i) == candidate {
                    candidate -= 1;
                } else {
                    break;
                }
            }
            Some(candidate)
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// Number of set bits strictly below `offset`, within this chunk.
pub fn count_below(blob: &[u8], offset: u16) -> u32 {
    match blob[0] {
        TAG_ALL_1 => offset as u32,
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            match packed_list::member(packed, count as usize, offset) {
                Ok(i) | Err(i) => i as u32,
            }
        }
        TAG_DENSE_BITMAP => {
            let dense = dense_payload(blob);
            let byte_i = (offset / 8) as usize;
            let bit_i = offset % 8;
            let mut count = popcount_bytes(&dense[..byte_i]);
            if bit_i > 0 {
                let mask = (1u16 << bit_i) as u8 - 1;
                count += (dense[byte_i] & mask).count_ones();
            }
            count
        }
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let unset_below = match packed_list::member(packed, count as usize, offset) {
                Ok(i) | Err(i) => i as u32,
            };
            offset as u32 - unset_below
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// The offset of the `k`-th set bit (0-indexed) within this chunk, or
/// `None` if the chunk has fewer than `k + 1` set bits.
pub fn nth_set_offset(blob: &[u8], k: u32) -> Option<u16> {
    match blob[0] {
        TAG_ALL_1 => ((k as u64) < W).then_some(k as u16),
        TAG_SPARSE_SET => {
            let (count, packed) = sparse_payload(blob);
            (k < count).then(|| packed_list::get(packed, k as usize))
        }
        TAG_DENSE_BITMAP => {
            let dense = dense_payload(blob);
            let mut remaining = k;
            for (word_idx, word_bytes) in dense.chunks_exact(8).enumerate() {
                let word = u64::from_le_bytes(word_bytes.try_into().unwrap());
                let pop = word.count_ones();
                if remaining < pop {
                    let mut w = word;
                    let mut r = remaining;
                    loop {
                        let tz = w.trailing_zeros();
                        if r == 0 {
                            return Some((word_idx * 64 + tz as usize) as u16);
                        }
                        w &= w - 1;
                        r -= 1;
                    }
                }
                remaining -= pop;
            }
            None
        }
        TAG_SPARSE_UNSET => {
            let (count, packed) = sparse_payload(blob);
            let n = count as usize;
            let mut candidate: u16 = 0;
            let mut unset_idx = 0usize;
            let mut remaining = k;
            while (candidate as u64) < W {
                if unset_idx < n && packed_list::get(packed, unset_idx) == candidate {
                    unset_idx += 1;
                    candidate += 1;
                    continue;
                }
                if remaining == 0 {
                    return Some(candidate);
                }
                remaining -= 1;
                candidate += 1;
            }
            None
        }
        other => panic!("unknown chunk variant tag {other}"),
    }
}

/// The raw ascending offset list stored by a SPARSE_SET or SPARSE_UNSET
/// blob, exactly as packed — set offsets for the former, unset offsets for
/// the latter. Used by the wire serializer, which re-expands the packed
/// 13-bit list to ordinary varints without attaching set/unset meaning to
/// them (that meaning is recovered from the tag byte alone).
pub(crate) fn raw_offsets(blob: &[u8]) -> Vec<u16> {
    let (count, packed) = sparse_payload(blob);
    (0..count as usize).map(|i| packed_list::get(packed, i)).collect()
}

/// Ascending set-bit offsets for any variant, used by the forward iterator.
pub fn to_sorted_offsets(blob: &[u8]) -> Vec<u16> {
    let mut dense = [0u8; DENSE_BYTES];
    expand_into(blob, &mut dense);
    ctz_scan_set(&dense)
}

// --- internal helpers -------------------------------------------------

fn sparse_payload(blob: &[u8]) -> (u32, &[u8]) {
    let (count, used) = varint::read_uvarint(&blob[1..]).expect("corrupt in-memory chunk blob");
    (count as u32, &blob[1 + used..])
}

fn dense_payload(blob: &[u8]) -> &[u8; DENSE_BYTES] {
    (&blob[1..1 + DENSE_BYTES])
        .try_into()
        .expect("dense chunk blob has the wrong length")
}

pub(crate) fn build_sparse_blob(tag: u8, sorted_offsets: &[u16]) -> Vec<u8> {
    let mut blob = vec![tag];
    varint::write_uvarint(&mut blob, sorted_offsets.len() as u64);
    let mut payload = vec![0u8; packed_list::byte_len(sorted_offsets.len())];
    for (i, &v) in sorted_offsets.iter().enumerate() {
        packed_list::set(&mut payload, i, v);
    }
    blob.extend_from_slice(&payload);
    blob
}

pub(crate) fn build_dense_blob(dense: &[u8; DENSE_BYTES]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(1 + DENSE_BYTES);
    blob.push(TAG_DENSE_BITMAP);
    blob.extend_from_slice(dense);
    blob
}

pub(crate) fn set_bit(buf: &mut [u8], offset: u16) {
    buf[(offset / 8) as usize] |= 1 << (offset % 8);
}

pub(crate) fn clear_bit(buf: &mut [u8], offset: u16) {
    buf[(offset / 8) as usize] &= !(1 << (offset % 8));
}

fn get_bit(buf: &[u8], offset: u16) -> bool {
    (buf[(offset / 8) as usize] >> (offset % 8)) & 1 != 0
}

/// Exact popcount of a byte slice, summing `u64::count_ones` over 8-byte
/// words with a byte-wise tail for lengths not a multiple of 8 (§6.2).
pub(crate) fn popcount_bytes(bytes: &[u8]) -> u32 {
    let chunks = bytes.chunks_exact(8);
    let tail = chunks.remainder();
    let mut sum = 0u32;
    for word_bytes in chunks {
        sum += u64::from_le_bytes(word_bytes.try_into().unwrap()).count_ones();
    }
    for &b in tail {
        sum += b.count_ones();
    }
    sum
}

/// Ascending offsets of the set bits in a dense 1024-byte bitmap, via the
/// trailing-zero scan described in §4.2.
pub(crate) fn ctz_scan_set(bitmap: &[u8; DENSE_BYTES]) -> Vec<u16> {
    let mut out = Vec::new();
    for (word_idx, word_bytes) in bitmap.chunks_exact(8).enumerate() {
        let mut word = u64::from_le_bytes(word_bytes.try_into().unwrap());
        while word != 0 {
            let tz = word.trailing_zeros();
            out.push((word_idx * 64 + tz as usize) as u16);
            word &= word - 1;
        }
    }
    out
}

/// Ascending offsets of the *clear* bits in a dense 1024-byte bitmap (used
/// when compressing into SPARSE_UNSET).
pub(crate) fn ctz_scan_unset(bitmap: &[u8; DENSE_BYTES]) -> Vec<u16> {
    let mut out = Vec::new();
    for (word_idx, word_bytes) in bitmap.chunks_exact(8).enumerate() {
        let mut word = !u64::from_le_bytes(word_bytes.try_into().unwrap());
        while word != 0 {
            let tz = word.trailing_zeros();
            out.push((word_idx * 64 + tz as usize) as u16);
            word &= word - 1;
        }
    }
    out
}

fn ctz_first_set(bitmap: &[u8; DENSE_BYTES]) -> Option<u16> {
    for (word_idx, word_bytes) in bitmap.chunks_exact(8).enumerate() {
        let word = u64::from_le_bytes(word_bytes.try_into().unwrap());
        if word != 0 {
            return Some((word_idx * 64 + word.trailing_zeros() as usize) as u16);
        }
    }
    None
}

fn ctz_last_set(bitmap: &[u8; DENSE_BYTES]) -> Option<u16> {
    for (word_idx, word_bytes) in bitmap.chunks_exact(8).enumerate().rev() {
        let word = u64::from_le_bytes(word_bytes.try_into().unwrap());
        if word != 0 {
            let bit = 63 - word.leading_zeros();
            return Some((word_idx * 64 + bit as usize) as u16);
        }
    }
    None
}

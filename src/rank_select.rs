//! Rank, select, and range operations (§4.5).
//!
//! `rank`/`select` walk the entry map in ascending chunk-id order,
//! accumulating whole-chunk population until the target falls inside one
//! chunk, then descend into that chunk's variant-specific count. Range
//! mutation splits `[lo, hi)` into a head-chunk partial, zero or more
//! interior whole chunks, and a tail-chunk partial, matching the bulk
//! fast path the spec calls for (a reference implementation may instead
//! loop bit-by-bit — the observable result must be identical).

use crate::{
    bitset::{chunk_id_and_offset, Bitset},
    chunk, DENSE_BYTES, W,
};

impl Bitset {
    /// Number of set bits in `[0, p)`.
    pub fn rank(&self, p: u64) -> u64 {
        self.range_count(0, p)
    }

    /// Position of the `k`-th set bit, 1-indexed. `None` if `k` is zero or
    /// exceeds the total population.
    pub fn select(&self, k: u64) -> Option<u64> {
        if k == 0 {
            return None;
        }
        let mut remaining = k - 1;
        for (cid, blob) in self.entries.iter() {
            let pop = chunk::population(blob);
            if remaining < pop {
                let off = chunk::nth_set_offset(blob, remaining as u32)?;
                return Some(cid * W + off as u64);
            }
            remaining -= pop;
        }
        None
    }

    /// Number of set bits in `[lo, hi)`.
    pub fn range_count(&self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return 0;
        }
        let (lo_cid, lo_off) = chunk_id_and_offset(lo);
        let (hi_cid, hi_off_incl) = chunk_id_and_offset(hi - 1);
        let mut total = 0u64;
        for (cid, blob) in self.entries.iter() {
            if cid < lo_cid || cid > hi_cid {
                continue;
            }
            total += if cid == lo_cid && cid == hi_cid {
                chunk::count_below(blob, hi_off_incl + 1) as u64
                    - chunk::count_below(blob, lo_off) as u64
            } else if cid == lo_cid {
                chunk::population(blob) - chunk::count_below(blob, lo_off) as u64
            } else if cid == hi_cid {
                chunk::count_below(blob, hi_off_incl + 1) as u64
            } else {
                chunk::population(blob)
            };
        }
        total
    }

    pub fn set_range(&mut self, lo: u64, hi: u64) {
        self.for_each_span(
            lo,
            hi,
            |bitset, cid, lo_off, hi_off| bitset.set_range_within_chunk(cid, lo_off, hi_off),
            |bitset, cid| {
                bitset.entries.upsert(cid, chunk::all_ones());
            },
        );
    }

    pub fn clear_range(&mut self, lo: u64, hi: u64) {
        self.for_each_span(
            lo,
            hi,
            |bitset, cid, lo_off, hi_off| bitset.clear_range_within_chunk(cid, lo_off, hi_off),
            |bitset, cid| {
                bitset.entries.delete(cid);
            },
        );
    }

    pub fn flip_range(&mut self, lo: u64, hi: u64) {
        self.for_each_span(
            lo,
            hi,
            |bitset, cid, lo_off, hi_off| bitset.flip_range_within_chunk(cid, lo_off, hi_off),
            |bitset, cid| bitset.flip_whole_chunk(cid),
        );
    }

    /// Drives a range mutation across its head-chunk partial, interior
    /// whole chunks, and tail-chunk partial. `partial` handles a bounded
    /// `[lo_off, hi_off)` slice of one chunk; `whole` handles an entire
    /// chunk id that falls completely inside the range.
    fn for_each_span(
        &mut self,
        lo: u64,
        hi: u64,
        partial: impl Fn(&mut Self, u64, u16, u16),
        whole: impl Fn(&mut Self, u64),
    ) {
        if hi <= lo {
            return;
        }
        let (lo_cid, lo_off) = chunk_id_and_offset(lo);
        let (hi_cid, hi_off_incl) = chunk_id_and_offset(hi - 1);
        if lo_cid == hi_cid {
            partial(self, lo_cid, lo_off, hi_off_incl + 1);
            return;
        }
        partial(self, lo_cid, lo_off, W as u16);
        for cid in (lo_cid + 1)..hi_cid {
            whole(self, cid);
        }
        partial(self, hi_cid, 0, hi_off_incl + 1);
    }

    fn set_range_within_chunk(&mut self, cid: u64, lo_off: u16, hi_off: u16) {
        if lo_off == 0 && hi_off as u64 == W {
            self.entries.upsert(cid, chunk::all_ones());
            return;
        }
        let mut dense = [0u8; DENSE_BYTES];
        if let Some(blob) = self.entries.lookup(cid) {
            chunk::expand_into(blob, &mut dense);
        }
        for off in lo_off..hi_off {
            chunk::set_bit(&mut dense, off);
        }
        self.entries.upsert(cid, chunk::compress_from(&dense).expect("non-empty after set"));
    }

    fn clear_range_within_chunk(&mut self, cid: u64, lo_off: u16, hi_off: u16) {
        if lo_off == 0 && hi_off as u64 == W {
            self.entries.delete(cid);
            return;
        }
        let Some(blob) = self.entries.lookup(cid) else {
            return;
        };
        let mut dense = [0u8; DENSE_BYTES];
        chunk::expand_into(blob, &mut dense);
        for off in lo_off..hi_off {
            chunk::clear_bit(&mut dense, off);
        }
        match chunk::compress_from(&dense) {
            Some(new_blob) => self.entries.replace(cid, new_blob),
            None => {
                self.entries.delete(cid);
            }
        }
    }

    fn flip_range_within_chunk(&mut self, cid: u64, lo_off: u16, hi_off: u16) {
        let mut dense = [0u8; DENSE_BYTES];
        if let Some(blob) = self.entries.lookup(cid) {
            chunk::expand_into(blob, &mut dense);
        }
        for off in lo_off..hi_off {
            let byte_i = (off / 8) as usize;
            dense[byte_i] ^= 1 << (off % 8);
        }
        match chunk::compress_from(&dense) {
            Some(new_blob) => self.entries.upsert(cid, new_blob),
            None => {
                self.entries.delete(cid);
            }
        }
    }

    fn flip_whole_chunk(&mut self, cid: u64) {
        match self.entries.lookup(cid) {
            None => self.entries.insert(cid, chunk::all_ones()),
            Some(blob) => {
                let mut dense = [0u8; DENSE_BYTES];
                chunk::expand_into(blob, &mut dense);
                for b in dense.iter_mut() {
                    *b = !*b;
                }
                match chunk::compress_from(&dense) {
                    Some(new_blob) => self.entries.replace(cid, new_blob),
                    None => {
                        self.entries.delete(cid);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_and_select_agree_on_a_scattered_set() {
        let positions = [1u64, 2, 5, 8192, 8193, 8300, 20000];
        let bitset = Bitset::from_array(&positions);

        assert_eq!(bitset.rank(0), 0);
        assert_eq!(bitset.rank(2), 1);
        assert_eq!(bitset.rank(6), 3);
        assert_eq!(bitset.rank(8193), 4);
        assert_eq!(bitset.rank(u64::MAX), positions.len() as u64);

        for (i, &p) in positions.iter().enumerate() {
            assert_eq!(bitset.select(i as u64 + 1), Some(p));
        }
        assert_eq!(bitset.select(0), None);
        assert_eq!(
            bitset.select(positions.len() as u64 + 1),
            None
        );
    }

    #[test]
    fn range_count_matches_brute_force() {
        let positions = [3u64, 10, 8190, 8192, 8193, 16000];
        let bitset = Bitset::from_array(&positions);
        for &(lo, hi) in &[(0u64, 8192u64), (5, 8193), (8190, 8194), (0, 100000)] {
            let expected = positions.iter().filter(|&&p| p >= lo && p < hi).count() as u64;
            assert_eq!(bitset.range_count(lo, hi), expected);
        }
    }

    #[test]
    fn set_range_spans_multiple_chunks() {
        let mut bitset = Bitset::new();
        bitset.set_range(8000, 8400);
        for p in 8000..8400 {
            assert!(bitset.test(p));
        }
        assert!(!bitset.test(7999));
        assert!(!bitset.test(8400));
        assert_eq!(bitset.bit_count(), 400);
    }

    #[test]
    fn clear_range_removes_interior_whole_chunks() {
        let mut bitset = Bitset::new();
        bitset.set_range(0, 3 * 8192);
        bitset.clear_range(100, 2 * 8192 + 50);
        assert!(bitset.test(99));
        assert!(!bitset.test(100));
        assert!(!bitset.test(2 * 8192 + 49));
        assert!(bitset.test(2 * 8192 + 50));
    }

    #[test]
    fn flip_range_toggles_every_bit_in_span() {
        let mut bitset = Bitset::from_array(&[10, 8200]);
        bitset.flip_range(0, 8192 * 2);
        assert!(!bitset.test(10));
        assert!(bitset.test(8200));
        for p in 0..8192 * 2 {
            let expected = p != 10 && p != 8200;
            assert_eq!(bitset.test(p), expected, "position {p}");
        }
    }
}

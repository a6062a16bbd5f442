//! The bitset container (§4.3): owns the entry map, resolves chunk ids, and
//! drives the chunk codec for point, bulk, and query operations. Range
//! operations live in `rank_select.rs`, set algebra in `algebra.rs`,
//! iteration in `iter.rs`, similarity in `similarity.rs`, and the wire
//! format in `serialize.rs` — all of them `impl Bitset` from their own
//! module, reaching into `entries`/`preamble` directly since everything
//! here is one crate.

use crate::{chunk, entry_map::EntryMap, DENSE_BYTES, W};

/// Opaque preamble carried by a `Bitset` created in "value matrix" mode.
/// The chunk logic never reads this; it is only round-tripped through
/// serialization (spec §9 Open Question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixPreamble {
    pub value_width: u8,
    pub rows: u64,
    pub cols: u64,
}

/// A compressed sparse bitset over 64-bit positions.
#[derive(Debug, Clone, Default)]
pub struct Bitset {
    pub(crate) entries: EntryMap,
    pub(crate) preamble: Option<MatrixPreamble>,
}

#[inline]
pub(crate) fn chunk_id_and_offset(p: u64) -> (u64, u16) {
    (p / W, (p % W) as u16)
}

impl Bitset {
    pub fn new() -> Self {
        Bitset::default()
    }

    /// Constructs an empty bitset carrying a value-matrix preamble. The
    /// dimensions are opaque metadata; the core never consults them.
    pub fn with_matrix_preamble(value_width: u8, rows: u64, cols: u64) -> Self {
        Bitset {
            entries: EntryMap::new(),
            preamble: Some(MatrixPreamble {
                value_width,
                rows,
                cols,
            }),
        }
    }

    pub fn matrix_preamble(&self) -> Option<MatrixPreamble> {
        self.preamble
    }

    pub fn from_array(positions: &[u64]) -> Self {
        let mut bitset = Bitset::new();
        bitset.set_many(positions);
        bitset
    }

    /// Sets `p`, returning whether it was already set.
    pub fn set(&mut self, p: u64) -> bool {
        let (cid, off) = chunk_id_and_offset(p);
        match self.entries.entry_mut(cid) {
            Some(blob) => chunk::set(blob, off),
            None => {
                self.entries.insert(cid, chunk::single(off));
                false
            }
        }
    }

    pub fn test(&self, p: u64) -> bool {
        let (cid, off) = chunk_id_and_offset(p);
        self.entries
            .lookup(cid)
            .map(|blob| chunk::test(blob, off))
            .unwrap_or(false)
    }

    /// Clears `p`, returning whether it was previously set. `remove` is an
    /// alias of the same operation.
    pub fn clear(&mut self, p: u64) -> bool {
        let (cid, off) = chunk_id_and_offset(p);
        let Some(blob) = self.entries.entry_mut(cid) else {
            return false;
        };
        let result = chunk::clear(blob, off);
        if result.now_empty {
            self.entries.delete(cid);
        }
        result.previously_set
    }

    pub fn remove(&mut self, p: u64) -> bool {
        self.clear(p)
    }

    pub fn set_many(&mut self, positions: &[u64]) {
        for &p in positions {
            self.set(p);
        }
    }

    pub fn test_many(&self, positions: &[u64]) -> Vec<bool> {
        positions.iter().map(|&p| self.test(p)).collect()
    }

    pub fn to_array(&self) -> Vec<u64> {
        self.iter().collect()
    }

    pub fn bit_count(&self) -> u64 {
        self.entries
            .iter()
            .map(|(_, blob)| chunk::population(blob))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min(&self) -> Option<u64> {
        let (cid, blob) = self.entries.iter().next()?;
        chunk::first_set_offset(blob).map(|off| cid * W + off as u64)
    }

    pub fn max(&self) -> Option<u64> {
        let (cid, blob) = self.entries.iter().next_back()?;
        chunk::last_set_offset(blob).map(|off| cid * W + off as u64)
    }

    pub fn is_subset(&self, other: &Bitset) -> bool {
        for (cid, blob) in self.entries.iter() {
            match other.entries.lookup(cid) {
                None => return false,
                Some(other_blob) => {
                    let mut a = [0u8; DENSE_BYTES];
                    let mut b = [0u8; DENSE_BYTES];
                    chunk::expand_into(blob, &mut a);
                    chunk::expand_into(other_blob, &mut b);
                    for i in 0..DENSE_BYTES {
                        if a[i] & !b[i] != 0 {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    pub fn intersects(&self, other: &Bitset) -> bool {
        for (cid, blob) in self.entries.iter() {
            if let Some(other_blob) = other.entries.lookup(cid) {
                let mut a = [0u8; DENSE_BYTES];
                let mut b = [0u8; DENSE_BYTES];
                chunk::expand_into(blob, &mut a);
                chunk::expand_into(other_blob, &mut b);
                if a.iter().zip(b.iter()).any(|(x, y)| x & y != 0) {
                    return true;
                }
            }
        }
        false
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.total_bytes()
    }
}

impl PartialEq for Bitset {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.entries.iter();
        let mut b = other.entries.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some((ak, ablob)), Some((bk, bblob))) => {
                    if ak != bk {
                        return false;
                    }
                    let mut da = [0u8; DENSE_BYTES];
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(ablob, &mut da);
                    chunk::expand_into(bblob, &mut db);
                    if da != db {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl Eq for Bitset {}

//! Pairwise and N-way set algebra (§6.4): AND, OR, XOR, AND-NOT, and NOT.
//!
//! Every combining operation expands the participating chunks to a
//! canonical 1024-byte dense bitmap, combines word-wise, and re-compresses
//! through [`chunk::compress_from`] — the same "expand, combine, compress"
//! shape as the teacher's `Bitmap256::{union,intersect,subtract}`, just
//! keyed by chunk id instead of operating on a single fixed-size bitmap.
//!
//! NOT is chunk-local: it complements bits only within chunks that already
//! exist in the operand. Complementing a sparse structure against the full
//! unbounded `u64` position space would yield an infinite set, so this is
//! the only sound definition without an explicit universe bound; a caller
//! wanting a bounded complement intersects the result against a mask of
//! their own.

use crate::{bitset::Bitset, chunk, DENSE_BYTES};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Ascending union of chunk ids present across every set, computed once up
/// front so the N-way folds below make a single pass over it instead of
/// repeatedly re-deriving the same union via a left-fold of the binary op.
fn chunk_id_union(sets: &[&Bitset]) -> Vec<u64> {
    let mut ids = BTreeSet::new();
    for s in sets {
        ids.extend(s.entries.iter().map(|(cid, _)| cid));
    }
    ids.into_iter().collect()
}

fn or_new(a: &Bitset, b: &Bitset) -> Bitset {
    let mut result = Bitset::new();
    let mut ai = a.entries.iter().peekable();
    let mut bi = b.entries.iter().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (Some((ak, ablob)), Some((bk, bblob))) => match ak.cmp(&bk) {
                Ordering::Less => {
                    result.entries.insert(ak, ablob.to_vec());
                    ai.next();
                }
                Ordering::Greater => {
                    result.entries.insert(bk, bblob.to_vec());
                    bi.next();
                }
                Ordering::Equal => {
                    let mut da = [0u8; DENSE_BYTES];
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(ablob, &mut da);
                    chunk::expand_into(bblob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] |= db[i];
                    }
                    if let Some(blob) = chunk::compress_from(&da) {
                        result.entries.insert(ak, blob);
                    }
                    ai.next();
                    bi.next();
                }
            },
            (Some((ak, ablob)), None) => {
                result.entries.insert(ak, ablob.to_vec());
                ai.next();
            }
            (None, Some((bk, bblob))) => {
                result.entries.insert(bk, bblob.to_vec());
                bi.next();
            }
            (None, None) => break,
        }
    }
    result
}

fn and_new(a: &Bitset, b: &Bitset) -> Bitset {
    let mut result = Bitset::new();
    let mut ai = a.entries.iter().peekable();
    let mut bi = b.entries.iter().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (Some((ak, ablob)), Some((bk, bblob))) => match ak.cmp(&bk) {
                Ordering::Less => {
                    ai.next();
                }
                Ordering::Greater => {
                    bi.next();
                }
                Ordering::Equal => {
                    let mut da = [0u8; DENSE_BYTES];
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(ablob, &mut da);
                    chunk::expand_into(bblob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] &= db[i];
                    }
                    if let Some(blob) = chunk::compress_from(&da) {
                        result.entries.insert(ak, blob);
                    }
                    ai.next();
                    bi.next();
                }
            },
            _ => break,
        }
    }
    result
}

fn xor_new(a: &Bitset, b: &Bitset) -> Bitset {
    let mut result = Bitset::new();
    let mut ai = a.entries.iter().peekable();
    let mut bi = b.entries.iter().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (Some((ak, ablob)), Some((bk, bblob))) => match ak.cmp(&bk) {
                Ordering::Less => {
                    result.entries.insert(ak, ablob.to_vec());
                    ai.next();
                }
                Ordering::Greater => {
                    result.entries.insert(bk, bblob.to_vec());
                    bi.next();
                }
                Ordering::Equal => {
                    let mut da = [0u8; DENSE_BYTES];
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(ablob, &mut da);
                    chunk::expand_into(bblob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] ^= db[i];
                    }
                    if let Some(blob) = chunk::compress_from(&da) {
                        result.entries.insert(ak, blob);
                    }
                    ai.next();
                    bi.next();
                }
            },
            (Some((ak, ablob)), None) => {
                result.entries.insert(ak, ablob.to_vec());
                ai.next();
            }
            (None, Some((bk, bblob))) => {
                result.entries.insert(bk, bblob.to_vec());
                bi.next();
            }
            (None, None) => break,
        }
    }
    result
}

fn and_not_new(a: &Bitset, b: &Bitset) -> Bitset {
    let mut result = Bitset::new();
    let mut ai = a.entries.iter().peekable();
    let mut bi = b.entries.iter().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (Some((ak, ablob)), Some((bk, _))) => match ak.cmp(&bk) {
                Ordering::Less => {
                    result.entries.insert(ak, ablob.to_vec());
                    ai.next();
                }
                Ordering::Greater => {
                    bi.next();
                }
                Ordering::Equal => {
                    let (_, ablob) = ai.next().unwrap();
                    let (_, bblob) = bi.next().unwrap();
                    let mut da = [0u8; DENSE_BYTES];
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(ablob, &mut da);
                    chunk::expand_into(bblob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] &= !db[i];
                    }
                    if let Some(blob) = chunk::compress_from(&da) {
                        result.entries.insert(ak, blob);
                    }
                }
            },
            (Some((ak, ablob)), None) => {
                result.entries.insert(ak, ablob.to_vec());
                ai.next();
            }
            _ => break,
        }
    }
    result
}

fn not_new(a: &Bitset) -> Bitset {
    let mut result = Bitset::new();
    for (cid, blob) in a.entries.iter() {
        let mut dense = [0u8; DENSE_BYTES];
        chunk::expand_into(blob, &mut dense);
        for b in dense.iter_mut() {
            *b = !*b;
        }
        if let Some(new_blob) = chunk::compress_from(&dense) {
            result.entries.insert(cid, new_blob);
        }
    }
    result
}

impl Bitset {
    pub fn or(&mut self, other: &Bitset) {
        for (k, blob) in other.entries.iter() {
            match self.entries.lookup(k) {
                None => {
                    self.entries.insert(k, blob.to_vec());
                }
                Some(ours) => {
                    let mut da = [0u8; DENSE_BYTES];
                    chunk::expand_into(ours, &mut da);
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(blob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] |= db[i];
                    }
                    match chunk::compress_from(&da) {
                        Some(new_blob) => self.entries.replace(k, new_blob),
                        None => {
                            self.entries.delete(k);
                        }
                    }
                }
            }
        }
    }

    pub fn and(&mut self, other: &Bitset) {
        for k in self.entries.keys_snapshot() {
            match other.entries.lookup(k) {
                None => {
                    self.entries.delete(k);
                }
                Some(theirs) => {
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(theirs, &mut db);
                    let ours = self.entries.lookup(k).unwrap();
                    let mut da = [0u8; DENSE_BYTES];
                    chunk::expand_into(ours, &mut da);
                    for i in 0..DENSE_BYTES {
                        da[i] &= db[i];
                    }
                    match chunk::compress_from(&da) {
                        Some(new_blob) => self.entries.replace(k, new_blob),
                        None => {
                            self.entries.delete(k);
                        }
                    }
                }
            }
        }
    }

    pub fn xor(&mut self, other: &Bitset) {
        for (k, blob) in other.entries.iter() {
            match self.entries.lookup(k) {
                None => {
                    self.entries.insert(k, blob.to_vec());
                }
                Some(ours) => {
                    let mut da = [0u8; DENSE_BYTES];
                    chunk::expand_into(ours, &mut da);
                    let mut db = [0u8; DENSE_BYTES];
                    chunk::expand_into(blob, &mut db);
                    for i in 0..DENSE_BYTES {
                        da[i] ^= db[i];
                    }
                    match chunk::compress_from(&da) {
                        Some(new_blob) => self.entries.replace(k, new_blob),
                        None => {
                            self.entries.delete(k);
                        }
                    }
                }
            }
        }
    }

    pub fn and_not(&mut self, other: &Bitset) {
        for k in self.entries.keys_snapshot() {
            if let Some(theirs) = other.entries.lookup(k) {
                let mut db = [0u8; DENSE_BYTES];
                chunk::expand_into(theirs, &mut db);
                let ours = self.entries.lookup(k).unwrap();
                let mut da = [0u8; DENSE_BYTES];
                chunk::expand_into(ours, &mut da);
                for i in 0..DENSE_BYTES {
                    da[i] &= !db[i];
                }
                match chunk::compress_from(&da) {
                    Some(new_blob) => self.entries.replace(k, new_blob),
                    None => {
                        self.entries.delete(k);
                    }
                }
            }
        }
    }

    /// Complements every bit within this bitset's currently-existing chunks.
    /// Chunk ids absent beforehand stay absent — see the module doc comment
    /// for why an unbounded complement isn't offered.
    pub fn not(&mut self) {
        for k in self.entries.keys_snapshot() {
            let blob = self.entries.lookup(k).unwrap();
            let mut dense = [0u8; DENSE_BYTES];
            chunk::expand_into(blob, &mut dense);
            for b in dense.iter_mut() {
                *b = !*b;
            }
            match chunk::compress_from(&dense) {
                Some(new_blob) => self.entries.replace(k, new_blob),
                None => {
                    self.entries.delete(k);
                }
            }
        }
    }

    pub fn new_or(&self, other: &Bitset) -> Bitset {
        or_new(self, other)
    }

    pub fn new_and(&self, other: &Bitset) -> Bitset {
        and_new(self, other)
    }

    pub fn new_xor(&self, other: &Bitset) -> Bitset {
        xor_new(self, other)
    }

    pub fn new_and_not(&self, other: &Bitset) -> Bitset {
        and_not_new(self, other)
    }

    pub fn new_not(&self) -> Bitset {
        not_new(self)
    }

    /// N-way intersection; empty input yields an empty bitset. Computes the
    /// chunk-id union once, then folds every participant's lane for each id
    /// in a single pass (not a left-fold of the pairwise `and`): a chunk
    /// absent from any one input makes the whole id absent from the result,
    /// short-circuiting before the remaining lanes are even expanded.
    pub fn and_n(sets: &[&Bitset]) -> Bitset {
        let mut result = Bitset::new();
        for cid in chunk_id_union(sets) {
            if sets.iter().any(|s| s.entries.lookup(cid).is_none()) {
                continue;
            }
            let mut acc = [0u8; DENSE_BYTES];
            chunk::expand_into(sets[0].entries.lookup(cid).unwrap(), &mut acc);
            for s in &sets[1..] {
                let mut lane = [0u8; DENSE_BYTES];
                chunk::expand_into(s.entries.lookup(cid).unwrap(), &mut lane);
                for i in 0..DENSE_BYTES {
                    acc[i] &= lane[i];
                }
            }
            if let Some(blob) = chunk::compress_from(&acc) {
                result.entries.insert(cid, blob);
            }
        }
        result
    }

    /// N-way union, one pass over the chunk-id union with all participants'
    /// lanes folded together per id.
    pub fn or_n(sets: &[&Bitset]) -> Bitset {
        let mut result = Bitset::new();
        for cid in chunk_id_union(sets) {
            let mut acc = [0u8; DENSE_BYTES];
            for s in sets {
                if let Some(blob) = s.entries.lookup(cid) {
                    let mut lane = [0u8; DENSE_BYTES];
                    chunk::expand_into(blob, &mut lane);
                    for i in 0..DENSE_BYTES {
                        acc[i] |= lane[i];
                    }
                }
            }
            if let Some(blob) = chunk::compress_from(&acc) {
                result.entries.insert(cid, blob);
            }
        }
        result
    }

    /// N-way symmetric difference, one pass over the chunk-id union with all
    /// participants' lanes folded together per id.
    pub fn xor_n(sets: &[&Bitset]) -> Bitset {
        let mut result = Bitset::new();
        for cid in chunk_id_union(sets) {
            let mut acc = [0u8; DENSE_BYTES];
            for s in sets {
                if let Some(blob) = s.entries.lookup(cid) {
                    let mut lane = [0u8; DENSE_BYTES];
                    chunk::expand_into(blob, &mut lane);
                    for i in 0..DENSE_BYTES {
                        acc[i] ^= lane[i];
                    }
                }
            }
            if let Some(blob) = chunk::compress_from(&acc) {
                result.entries.insert(cid, blob);
            }
        }
        result
    }
}

impl std::ops::BitAndAssign<&Bitset> for Bitset {
    fn bitand_assign(&mut self, rhs: &Bitset) {
        self.and(rhs);
    }
}

impl std::ops::BitOrAssign<&Bitset> for Bitset {
    fn bitor_assign(&mut self, rhs: &Bitset) {
        self.or(rhs);
    }
}

impl std::ops::BitXorAssign<&Bitset> for Bitset {
    fn bitxor_assign(&mut self, rhs: &Bitset) {
        self.xor(rhs);
    }
}

impl std::ops::BitAnd<&Bitset> for &Bitset {
    type Output = Bitset;
    fn bitand(self, rhs: &Bitset) -> Bitset {
        self.new_and(rhs)
    }
}

impl std::ops::BitOr<&Bitset> for &Bitset {
    type Output = Bitset;
    fn bitor(self, rhs: &Bitset) -> Bitset {
        self.new_or(rhs)
    }
}

impl std::ops::BitXor<&Bitset> for &Bitset {
    type Output = Bitset;
    fn bitxor(self, rhs: &Bitset) -> Bitset {
        self.new_xor(rhs)
    }
}

impl std::ops::Not for &Bitset {
    type Output = Bitset;
    fn not(self) -> Bitset {
        self.new_not()
    }
}

//! Similarity metrics over pairs of bitsets (§4.7): Jaccard, Dice, overlap,
//! and Hamming distance, all built on a single streamed intersection-
//! popcount pass so large inputs never materialise a combined bitset.

use crate::{bitset::Bitset, chunk, DENSE_BYTES};
use std::cmp::Ordering;

fn intersection_popcount(a: &Bitset, b: &Bitset) -> u64 {
    let mut total = 0u64;
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
                        total += (da[i] & db[i]).count_ones() as u64;
                    }
                    ai.next();
                    bi.next();
                }
            },
            _ => break,
        }
    }
    total
}

impl Bitset {
    pub fn jaccard(&self, other: &Bitset) -> f64 {
        let inter = intersection_popcount(self, other) as f64;
        let total_a = self.bit_count() as f64;
        let total_b = other.bit_count() as f64;
        let union = total_a + total_b - inter;
        if union == 0.0 {
            1.0
        } else {
            inter / union
        }
    }

    pub fn dice(&self, other: &Bitset) -> f64 {
        let inter = intersection_popcount(self, other) as f64;
        let denom = self.bit_count() as f64 + other.bit_count() as f64;
        if denom == 0.0 {
            1.0
        } else {
            2.0 * inter / denom
        }
    }

    pub fn overlap(&self, other: &Bitset) -> f64 {
        let total_a = self.bit_count();
        let total_b = other.bit_count();
        if total_a == 0 || total_b == 0 {
            return 0.0;
        }
        let inter = intersection_popcount(self, other) as f64;
        inter / total_a.min(total_b) as f64
    }

    pub fn hamming_distance(&self, other: &Bitset) -> u64 {
        let inter = intersection_popcount(self, other);
        self.bit_count() + other.bit_count() - 2 * inter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example_from_spec() {
        let a = Bitset::from_array(&[1, 2, 3, 4]);
        let b = Bitset::from_array(&[3, 4, 5, 6]);
        assert!((a.jaccard(&b) - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(a.hamming_distance(&b), 4);
    }

    #[test]
    fn both_empty_conventions() {
        let a = Bitset::new();
        let b = Bitset::new();
        assert_eq!(a.jaccard(&b), 1.0);
        assert_eq!(a.dice(&b), 1.0);
        assert_eq!(a.overlap(&b), 0.0);
        assert_eq!(a.hamming_distance(&b), 0);
    }

    #[test]
    fn one_empty_overlap_is_zero() {
        let a = Bitset::new();
        let b = Bitset::from_array(&[1, 2, 3]);
        assert_eq!(a.overlap(&b), 0.0);
        assert_eq!(b.overlap(&a), 0.0);
    }

    #[test]
    fn disjoint_sets() {
        let a = Bitset::from_array(&[1, 2]);
        let b = Bitset::from_array(&[100, 200]);
        assert_eq!(a.jaccard(&b), 0.0);
        assert_eq!(a.dice(&b), 0.0);
        assert_eq!(a.hamming_distance(&b), 4);
    }

    #[test]
    fn identical_sets_are_maximally_similar() {
        let a = Bitset::from_array(&[7, 8, 9]);
        let b = Bitset::from_array(&[7, 8, 9]);
        assert_eq!(a.jaccard(&b), 1.0);
        assert_eq!(a.dice(&b), 1.0);
        assert_eq!(a.overlap(&b), 1.0);
        assert_eq!(a.hamming_distance(&b), 0);
    }
}

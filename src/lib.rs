//! A compressed sparse bitset: a mapping from 64-bit integer positions to
//! boolean membership that occupies space proportional to the information
//! content of the set rather than to the highest position ever set.
//!
//! Positions are partitioned into fixed-width windows ("chunks") of `W =
//! 8192` bits each. Each chunk independently picks one of five adaptive
//! representations ([`chunk::Variant`]) based on its current population, so
//! a chunk that is empty, full, mostly-empty, mostly-full, or genuinely
//! mixed all get a representation close to their own information content.
//!
//! This crate generalises the two-level (16-bit key, 16-bit in-container
//! offset) split of a classic roaring bitmap to a one-level split: a 64-bit
//! chunk id paired with an 8192-bit chunk, where the chunk itself picks
//! among five variants instead of two.

mod algebra;
mod bitset;
mod chunk;
mod entry_map;
mod iter;
mod packed_list;
mod rank_select;
mod serialize;
mod similarity;
mod varint;

pub use bitset::{Bitset, MatrixPreamble};
pub use iter::BitsetIter;
pub use serialize::DeserializeError;

/// Bits per chunk. Fixed at compile time; see spec §9 Design Notes.
pub(crate) const W: u64 = 8192;
/// Bytes per chunk in the dense bitmap representation (`W / 8`).
pub(crate) const DENSE_BYTES: usize = (W / 8) as usize;
/// Width in bits of one packed offset in the sparse variants (`ceil(log2 W)`).
pub(crate) const PACKED_BITS: u32 = 13;
/// Largest population for which SPARSE_SET (and SPARSE_UNSET's unset count)
/// is used: `floor(W / PACKED_BITS) - 1`.
pub(crate) const M: u64 = W / PACKED_BITS as u64 - 1;

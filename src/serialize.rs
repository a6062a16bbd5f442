//! Self-describing binary wire format (§6.4): magic, version, flags, a
//! varint-framed chunk count, then per-chunk tagged bodies. Every position
//! on the wire is re-expanded to an ordinary LEB128 varint — the 13-bit
//! packed list is purely an in-memory detail and never appears here.
//!
//! Deserialization never panics on untrusted bytes (§7): every read is
//! bounds-checked and every failure mode returns a [`DeserializeError`]
//! instead of unwinding.

use crate::{bitset::Bitset, chunk, varint, DENSE_BYTES, W};
use thiserror::Error;

const MAGIC: &[u8; 4] = b"ROAR";
const VERSION: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("bad magic bytes, expected \"ROAR\"")]
    BadMagic,
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),
    #[error("non-zero reserved flags {0:#x}")]
    BadFlags(u8),
    #[error("truncated input")]
    Truncated,
    #[error("varint overflow")]
    VarintOverflow,
    #[error("unknown chunk variant tag {0}")]
    UnknownVariantTag(u8),
    #[error("offset {0} outside [0, {W})")]
    InvalidOffset(u64),
}

impl From<varint::VarintError> for DeserializeError {
    fn from(e: varint::VarintError) -> Self {
        match e {
            varint::VarintError::Truncated => DeserializeError::Truncated,
            varint::VarintError::Overflow => DeserializeError::VarintOverflow,
            varint::VarintError::Io(_) => DeserializeError::Truncated,
        }
    }
}

pub fn serialize(bitset: &Bitset) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + bitset.memory_usage());
    serialize_into(bitset, &mut buf);
    buf
}

/// Appends the wire encoding of `bitset` to the end of `buf` without
/// allocating a fresh `Vec` for it, for callers assembling several bitsets
/// (or a bitset alongside other framed data) into one shared buffer.
pub fn serialize_into(bitset: &Bitset, buf: &mut Vec<u8>) {
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(0);
    varint::write_uvarint(buf, bitset.entries.len() as u64);
    for (cid, blob) in bitset.entries.iter() {
        varint::write_uvarint(buf, cid);
        buf.push(blob[0]);
        match blob[0] {
            chunk::TAG_ALL_1 => {}
            chunk::TAG_DENSE_BITMAP => buf.extend_from_slice(&blob[1..1 + DENSE_BYTES]),
            chunk::TAG_SPARSE_SET | chunk::TAG_SPARSE_UNSET => {
                let offsets = chunk::raw_offsets(blob);
                varint::write_uvarint(buf, offsets.len() as u64);
                for off in offsets {
                    varint::write_uvarint(buf, off as u64);
                }
            }
            other => unreachable!("unknown chunk variant tag {other} in entry map"),
        }
    }
    // The value-matrix preamble (spec §9 Open Question 3) is opaque to the
    // core and has no place in the fixed 6-byte header, so it rides as an
    // additive trailer: absent entirely for a bitset with no preamble, so
    // the byte stream for the common case matches §6.4 exactly.
    if let Some(preamble) = bitset.preamble {
        buf.push(1);
        buf.push(preamble.value_width);
        varint::write_uvarint(buf, preamble.rows);
        varint::write_uvarint(buf, preamble.cols);
    }
}

pub fn serialized_size(bitset: &Bitset) -> usize {
    let mut size = 6 + varint::uvarint_len(bitset.entries.len() as u64);
    for (cid, blob) in bitset.entries.iter() {
        size += varint::uvarint_len(cid) + 1;
        size += match blob[0] {
            chunk::TAG_ALL_1 => 0,
            chunk::TAG_DENSE_BITMAP => DENSE_BYTES,
            chunk::TAG_SPARSE_SET | chunk::TAG_SPARSE_UNSET => {
                let offsets = chunk::raw_offsets(blob);
                let mut n = varint::uvarint_len(offsets.len() as u64);
                for off in offsets {
                    n += varint::uvarint_len(off as u64);
                }
                n
            }
            other => unreachable!("unknown chunk variant tag {other} in entry map"),
        };
    }
    if let Some(preamble) = bitset.preamble {
        size += 2 + varint::uvarint_len(preamble.rows) + varint::uvarint_len(preamble.cols);
    }
    size
}

fn read_uvarint_at(buf: &[u8], pos: usize) -> Result<(u64, usize), DeserializeError> {
    let slice = buf.get(pos..).ok_or(DeserializeError::Truncated)?;
    Ok(varint::read_uvarint(slice)?)
}

pub fn deserialize(buf: &[u8]) -> Result<Bitset, DeserializeError> {
    if buf.len() < 6 {
        return Err(DeserializeError::Truncated);
    }
    if &buf[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }
    let version = buf[4];
    if version != VERSION {
        return Err(DeserializeError::UnsupportedVersion(version));
    }
    let flags = buf[5];
    if flags != 0 {
        return Err(DeserializeError::BadFlags(flags));
    }

    let mut pos = 6usize;
    let (chunk_count, used) = read_uvarint_at(buf, pos)?;
    pos += used;

    let mut bitset = Bitset::new();
    for _ in 0..chunk_count {
        let (cid, used) = read_uvarint_at(buf, pos)?;
        pos += used;
        let tag = *buf.get(pos).ok_or(DeserializeError::Truncated)?;
        pos += 1;

        let blob = match tag {
            chunk::TAG_ALL_1 => chunk::all_ones(),
            chunk::TAG_DENSE_BITMAP => {
                let end = pos.checked_add(DENSE_BYTES).ok_or(DeserializeError::Truncated)?;
                let slice = buf.get(pos..end).ok_or(DeserializeError::Truncated)?;
                pos = end;
                let mut dense = [0u8; DENSE_BYTES];
                dense.copy_from_slice(slice);
                chunk::build_dense_blob(&dense)
            }
            chunk::TAG_SPARSE_SET | chunk::TAG_SPARSE_UNSET => {
                let (n, used) = read_uvarint_at(buf, pos)?;
                pos += used;
                // Each offset needs at least one wire byte, so `n` can't
                // legitimately exceed the remaining buffer — reject before
                // trusting it as a `Vec` capacity (a crafted huge `n` would
                // otherwise panic/abort in `with_capacity` rather than
                // failing cleanly).
                let remaining = buf.len().saturating_sub(pos) as u64;
                if n > remaining {
                    return Err(DeserializeError::Truncated);
                }
                let mut offsets = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let (v, used) = read_uvarint_at(buf, pos)?;
                    pos += used;
                    if v >= W {
                        return Err(DeserializeError::InvalidOffset(v));
                    }
                    offsets.push(v as u16);
                }
                chunk::build_sparse_blob(tag, &offsets)
            }
            other => return Err(DeserializeError::UnknownVariantTag(other)),
        };
        bitset.entries.insert(cid, blob);
    }

    if pos < buf.len() {
        let marker = *buf.get(pos).ok_or(DeserializeError::Truncated)?;
        pos += 1;
        if marker != 1 {
            return Err(DeserializeError::Truncated);
        }
        let value_width = *buf.get(pos).ok_or(DeserializeError::Truncated)?;
        pos += 1;
        let (rows, used) = read_uvarint_at(buf, pos)?;
        pos += used;
        let (cols, _used) = read_uvarint_at(buf, pos)?;
        bitset.preamble = Some(crate::bitset::MatrixPreamble {
            value_width,
            rows,
            cols,
        });
    }
    Ok(bitset)
}

impl Bitset {
    pub fn serialize(&self) -> Vec<u8> {
        serialize(self)
    }

    /// Appends this bitset's wire encoding to `buf` in place; see
    /// [`serialize_into`] for when this is worth it over [`Bitset::serialize`].
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        serialize_into(self, buf)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Bitset, DeserializeError> {
        deserialize(buf)
    }

    pub fn serialized_size(&self) -> usize {
        serialized_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_into_appends_rather_than_overwrites() {
        let bitset = Bitset::from_array(&[1, 2, 3]);
        let mut buf = vec![0xAAu8, 0xBB];
        bitset.serialize_into(&mut buf);
        assert_eq!(&buf[..2], &[0xAA, 0xBB]);
        assert_eq!(&buf[2..], bitset.serialize().as_slice());
    }

    #[test]
    fn round_trips_a_mix_of_variants() {
        let mut bitset = Bitset::new();
        bitset.set_range(0, W); // ALL_1 chunk 0
        bitset.set_many(&[2 * W + 5, 2 * W + 100]); // SPARSE_SET chunk 2
        bitset.set_range(3 * W, 4 * W);
        bitset.clear(3 * W + 42); // SPARSE_UNSET chunk 3
        for v in (4 * W..5 * W).step_by(2) {
            bitset.set(v); // DENSE_BITMAP chunk 4
        }

        let bytes = bitset.serialize();
        assert_eq!(bytes.len(), bitset.serialized_size());
        let restored = Bitset::deserialize(&bytes).expect("valid round trip");
        assert_eq!(restored, bitset);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![b'N', b'O', b'P', b'E', 1, 0, 0];
        assert_eq!(Bitset::deserialize(&bytes), Err(DeserializeError::BadMagic));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(2);
        bytes.push(0);
        bytes.push(0);
        assert_eq!(
            Bitset::deserialize(&bytes),
            Err(DeserializeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_nonzero_flags() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.push(5);
        bytes.push(0);
        assert_eq!(Bitset::deserialize(&bytes), Err(DeserializeError::BadFlags(5)));
    }

    #[test]
    fn rejects_truncated_input() {
        let bitset = Bitset::from_array(&[1, 2, 3]);
        let bytes = bitset.serialize();
        for cut in [0usize, 4, 6, bytes.len() - 1] {
            let truncated = &bytes[..cut];
            assert!(Bitset::deserialize(truncated).is_err());
        }
    }

    #[test]
    fn rejects_huge_sparse_count_without_panicking() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.push(0);
        varint::write_uvarint(&mut bytes, 1); // chunk count
        varint::write_uvarint(&mut bytes, 0); // chunk id
        bytes.push(chunk::TAG_SPARSE_SET);
        varint::write_uvarint(&mut bytes, u64::MAX); // bogus offset count
        assert_eq!(
            Bitset::deserialize(&bytes),
            Err(DeserializeError::Truncated)
        );
    }

    #[test]
    fn rejects_unknown_variant_tag() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.push(0);
        varint::write_uvarint(&mut bytes, 1);
        varint::write_uvarint(&mut bytes, 0);
        bytes.push(99);
        assert_eq!(
            Bitset::deserialize(&bytes),
            Err(DeserializeError::UnknownVariantTag(99))
        );
    }

    #[test]
    fn matrix_preamble_round_trips_as_an_additive_trailer() {
        let mut bitset = Bitset::with_matrix_preamble(4, 10, 20);
        bitset.set_many(&[1, 2, 3]);
        let bytes = bitset.serialize();

        let plain = Bitset::from_array(&[1, 2, 3]);
        assert_eq!(plain.serialize(), &bytes[..plain.serialize().len()]);

        let restored = Bitset::deserialize(&bytes).unwrap();
        assert_eq!(restored, bitset);
        assert_eq!(
            restored.matrix_preamble(),
            Some(crate::bitset::MatrixPreamble {
                value_width: 4,
                rows: 10,
                cols: 20,
            })
        );
    }

    #[test]
    fn empty_bitset_round_trips() {
        let bitset = Bitset::new();
        let bytes = bitset.serialize();
        let restored = Bitset::deserialize(&bytes).unwrap();
        assert_eq!(restored, bitset);
    }
}

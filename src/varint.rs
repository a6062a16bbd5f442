//! LEB128 (continuation-bit) varint helpers shared by the in-memory blob
//! count prefix (§3) and the wire format (§6.4). Both uses are the same
//! encoding; this module just saves every call site from wrapping slices
//! in `io::Cursor` by hand.

use std::io;

/// Writes `value` as an unsigned LEB128 varint, appending to `buf`.
pub fn write_uvarint(buf: &mut Vec<u8>, value: u64) {
    leb128::write::unsigned(buf, value).expect("Vec<u8> writes never fail");
}

/// Reads an unsigned LEB128 varint from the start of `buf`.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn read_uvarint(mut buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let start_len = buf.len();
    let value = leb128::read::unsigned(&mut buf).map_err(|e| match e {
        leb128::read::Error::IoError(inner) if inner.kind() == io::ErrorKind::UnexpectedEof => {
            VarintError::Truncated
        }
        leb128::read::Error::Overflow => VarintError::Overflow,
        leb128::read::Error::IoError(inner) => VarintError::Io(inner),
    })?;
    let consumed = start_len - buf.len();
    Ok((value, consumed))
}

/// Number of bytes `write_uvarint` would emit for `value`.
pub fn uvarint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

#[derive(Debug, thiserror::Error)]
pub enum VarintError {
    #[error("varint truncated before a terminating byte")]
    Truncated,
    #[error("varint overflowed 64 bits")]
    Overflow,
    #[error("io error reading varint: {0}")]
    Io(#[from] io::Error),
}

//! Canonical little-endian wire encoding
//!
//! Integers are little-endian; lengths and counts use the Bitcoin-style
//! compact-size varint and must be minimally encoded.

use crate::Hash;
use jio_hashes::{HashWriter, HASH_SIZE};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("non-canonical varint encoding of {0}")]
    NonCanonicalVarInt(u64),

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    #[error("declared length {0} exceeds remaining input")]
    LengthTooLarge(u64),
}

pub type WireResult<T> = std::result::Result<T, WireError>;

/// Byte sink for encoders. Writing never fails.
pub trait WireSink {
    fn put(&mut self, bytes: &[u8]);

    fn put_u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn put_u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.put(&v.to_le_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.put(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.put(&v.to_le_bytes());
    }

    fn put_hash(&mut self, h: &Hash) {
        self.put(h.as_bytes());
    }

    fn put_var_int(&mut self, v: u64) {
        if v < 0xfd {
            self.put_u8(v as u8);
        } else if v <= u16::MAX as u64 {
            self.put_u8(0xfd);
            self.put_u16(v as u16);
        } else if v <= u32::MAX as u64 {
            self.put_u8(0xfe);
            self.put_u32(v as u32);
        } else {
            self.put_u8(0xff);
            self.put_u64(v);
        }
    }

    fn put_var_bytes(&mut self, bytes: &[u8]) {
        self.put_var_int(bytes.len() as u64);
        self.put(bytes);
    }
}

impl WireSink for Vec<u8> {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl WireSink for HashWriter {
    fn put(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}

/// Counts bytes without storing them
#[derive(Default)]
pub struct SizeCounter(pub usize);

impl WireSink for SizeCounter {
    fn put(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

/// Number of bytes `put_var_int(v)` writes
pub fn var_int_size(v: u64) -> usize {
    if v < 0xfd {
        1
    } else if v <= u16::MAX as u64 {
        3
    } else if v <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Cursor over an input buffer
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> WireResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof { offset: self.pos, needed: n });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> WireResult<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_hash(&mut self) -> WireResult<Hash> {
        Ok(Hash::from_bytes(self.take_array::<HASH_SIZE>()?))
    }

    pub fn read_var_int(&mut self) -> WireResult<u64> {
        let (value, min) = match self.read_u8()? {
            0xfd => (self.read_u16()? as u64, 0xfd),
            0xfe => (self.read_u32()? as u64, u16::MAX as u64 + 1),
            0xff => (self.read_u64()?, u32::MAX as u64 + 1),
            b => (b as u64, 0),
        };
        if value < min {
            return Err(WireError::NonCanonicalVarInt(value));
        }
        Ok(value)
    }

    /// Reads a count that is bounded by the remaining input, so hostile counts cannot trigger huge allocations
    pub fn read_count(&mut self, min_item_size: usize) -> WireResult<usize> {
        let count = self.read_var_int()?;
        if count.saturating_mul(min_item_size.max(1) as u64) > self.remaining() as u64 {
            return Err(WireError::LengthTooLarge(count));
        }
        Ok(count as usize)
    }

    pub fn read_var_bytes(&mut self) -> WireResult<Vec<u8>> {
        let len = self.read_count(1)?;
        Ok(self.take(len)?.to_vec())
    }

    /// Fails unless the whole input was consumed
    pub fn finish(self) -> WireResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }
}

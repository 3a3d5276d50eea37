//! Binary helpers for the Bitcoin wire format.
//!
//! `VarInt` is the compact length prefix; `BsvReader` and `BsvWriter` move
//! little-endian integers and length-prefixed byte strings in and out of
//! buffers.

use crate::PrimitivesError;

/// A compact variable-length integer (1, 3, 5 or 9 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Encoded size in bytes.
    pub fn length(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let v = self.0;
        let mut out = Vec::with_capacity(self.length());
        match self.length() {
            1 => out.push(v as u8),
            3 => {
                out.push(0xfd);
                out.extend_from_slice(&(v as u16).to_le_bytes());
            }
            5 => {
                out.push(0xfe);
                out.extend_from_slice(&(v as u32).to_le_bytes());
            }
            _ => {
                out.push(0xff);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    /// The decoded value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VarInt {
    fn from(v: u64) -> Self {
        VarInt(v)
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BsvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BsvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BsvReader { data, pos: 0 }
    }

    /// Take the next `n` bytes, failing without advancing if fewer remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PrimitivesError> {
        if n > self.remaining() {
            return Err(PrimitivesError::UnexpectedEof {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PrimitivesError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PrimitivesError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, PrimitivesError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, PrimitivesError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, PrimitivesError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_varint(&mut self) -> Result<VarInt, PrimitivesError> {
        let v = match self.read_u8()? {
            0xff => self.read_u64_le()?,
            0xfe => self.read_u32_le()? as u64,
            0xfd => self.read_u16_le()? as u64,
            b => b as u64,
        };
        Ok(VarInt(v))
    }

    /// Read a varint length followed by that many bytes.
    ///
    /// The length is checked against the remaining input before any
    /// allocation, so a hostile prefix cannot trigger a huge reservation.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], PrimitivesError> {
        let len = self.read_varint()?.value();
        let len = usize::try_from(len).map_err(|_| PrimitivesError::UnexpectedEof {
            wanted: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.read_bytes(len)
    }

    /// Look at upcoming bytes without consuming them.
    pub fn peek_bytes(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(n)?)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Growable output buffer.
#[derive(Debug, Clone, Default)]
pub struct BsvWriter {
    buf: Vec<u8>,
}

impl BsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BsvWriter { buf: Vec::with_capacity(capacity) }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_u16_le(&mut self, val: u16) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_varint(&mut self, varint: VarInt) {
        self.buf.extend_from_slice(&varint.to_bytes());
    }

    /// Write `bytes` preceded by its varint length.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(VarInt::from(bytes.len()));
        self.write_bytes(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

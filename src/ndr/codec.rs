//! NDR codec
//!
//! Free `encode_*` functions append primitives to a stub buffer.
//! [`NdrWriter`] adds referent-id bookkeeping for unique pointers and
//! [`NdrReader`] is the matching cursor for decoding.

use bytes::{BufMut, Bytes, BytesMut};

use super::{WireType, WireValue};
use crate::error::CodecError;

/// Referent id given to the first non-null pointer in a stub
pub const FIRST_REFERENT_ID: u32 = 0x0002_0000;

/// Size of a conformant varying string header (max, offset, actual)
const WSTRING_HEADER_SIZE: usize = 12;

// =============================================================================
// Encoding
// =============================================================================

fn align(buf: &mut BytesMut, n: usize) {
    let pad = (n - buf.len() % n) % n;
    buf.put_bytes(0, pad);
}

/// Append a 4-byte little-endian integer
pub fn encode_uint32(buf: &mut BytesMut, value: u32) {
    align(buf, 4);
    buf.put_u32_le(value);
}

/// Append a NUL-terminated UTF-16 string with its conformance header
///
/// `value` must not contain an embedded NUL.
pub fn encode_wstring(buf: &mut BytesMut, value: &str) {
    let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
    let count = units.len() as u32;

    align(buf, 4);
    buf.reserve(WSTRING_HEADER_SIZE + units.len() * 2);
    buf.put_u32_le(count); // max_count
    buf.put_u32_le(0); // offset
    buf.put_u32_le(count); // actual_count
    for unit in units {
        buf.put_u16_le(unit);
    }
}

/// Append a length-prefixed byte array, unpadded
///
/// `bytes` must be at most `u32::MAX` long.
pub fn encode_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    align(buf, 4);
    buf.reserve(4 + bytes.len());
    buf.put_u32_le(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Append a unique pointer's referent id (0 for null)
pub fn encode_referent(buf: &mut BytesMut, referent: u32) {
    encode_uint32(buf, referent);
}

/// Stub builder that hands out referent ids for nullable fields
#[derive(Debug)]
pub struct NdrWriter {
    buf: BytesMut,
    next_referent: u32,
}

impl Default for NdrWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl NdrWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            next_referent: FIRST_REFERENT_ID,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode `value` as a field of type `ty`
    pub fn encode_value(&mut self, ty: WireType, value: &WireValue) -> Result<(), CodecError> {
        if !value.fits(ty) {
            return Err(CodecError::TypeMismatch {
                expected: ty,
                found: value.kind(),
            });
        }

        if ty.is_nullable() {
            if value.is_null() {
                encode_referent(&mut self.buf, 0);
                return Ok(());
            }
            let referent = self.next_referent;
            self.next_referent += 4;
            encode_referent(&mut self.buf, referent);
        }

        match value {
            WireValue::UInt32(v) => encode_uint32(&mut self.buf, *v),
            WireValue::WString(Some(s)) => encode_wstring(&mut self.buf, s),
            WireValue::Bytes(Some(b)) => encode_bytes(&mut self.buf, b),
            // nulls returned above
            WireValue::WString(None) | WireValue::Bytes(None) => {}
        }
        Ok(())
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Cursor over a stub buffer
#[derive(Debug)]
pub struct NdrReader {
    buf: Bytes,
    pos: usize,
}

impl NdrReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<Bytes, CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = self.buf.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    fn align(&mut self, n: usize) -> Result<(), CodecError> {
        let pad = (n - self.pos % n) % n;
        self.take(pad).map(|_| ())
    }

    /// Read a 4-byte little-endian integer
    pub fn decode_uint32(&mut self) -> Result<u32, CodecError> {
        self.align(4)?;
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Read a conformant varying UTF-16 string
    pub fn decode_wstring(&mut self) -> Result<String, CodecError> {
        let max_count = self.decode_uint32()?;
        let offset = self.decode_uint32()?;
        let actual_count = self.decode_uint32()?;

        if offset != 0 {
            return Err(CodecError::InvalidConformance(format!(
                "string offset {} (expected 0)",
                offset
            )));
        }
        if actual_count > max_count {
            return Err(CodecError::InvalidConformance(format!(
                "actual count {} exceeds max count {}",
                actual_count, max_count
            )));
        }

        let byte_len = (actual_count as usize)
            .checked_mul(2)
            .ok_or_else(|| CodecError::InvalidConformance("string too long".to_string()))?;
        let raw = self.take(byte_len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let end = units
            .iter()
            .position(|&unit| unit == 0)
            .ok_or(CodecError::MissingTerminator(units.len()))?;
        if end + 1 != units.len() {
            return Err(CodecError::InvalidConformance(format!(
                "string terminator at unit {} of {}",
                end,
                units.len()
            )));
        }

        String::from_utf16(&units[..end]).map_err(|_| CodecError::InvalidUtf16)
    }

    /// Read a length-prefixed byte array
    pub fn decode_bytes(&mut self) -> Result<Bytes, CodecError> {
        let len = self.decode_uint32()? as usize;
        self.take(len)
    }

    /// Read a unique pointer's referent id; true when non-null
    pub fn decode_pointer(&mut self) -> Result<bool, CodecError> {
        Ok(self.decode_uint32()? != 0)
    }

    /// Decode a field of type `ty`
    pub fn decode_value(&mut self, ty: WireType) -> Result<WireValue, CodecError> {
        let present = if ty.is_nullable() {
            self.decode_pointer()?
        } else {
            true
        };

        let value = match ty {
            WireType::UInt32 => WireValue::UInt32(self.decode_uint32()?),
            WireType::WString | WireType::NullableWString => {
                WireValue::WString(present.then(|| self.decode_wstring()).transpose()?)
            }
            WireType::Bytes | WireType::NullableBytes => {
                WireValue::Bytes(present.then(|| self.decode_bytes()).transpose()?)
            }
        };
        Ok(value)
    }

    /// Fail if any bytes remain unread
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

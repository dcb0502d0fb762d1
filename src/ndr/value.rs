//! Wire values
//!
//! Typed field values exchanged with the server.

use std::fmt;

use bytes::Bytes;

/// Declared type of a stub field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    UInt32,

    /// `[string] wchar_t*`, never null
    WString,

    /// `[string] wchar_t**` out parameter, may be null
    NullableWString,

    /// `[size_is] byte[]`, never null
    Bytes,

    /// `[size_is] byte**` out parameter, may be null
    NullableBytes,
}

impl WireType {
    /// Whether the field is transmitted behind a unique pointer
    pub fn is_nullable(self) -> bool {
        matches!(self, WireType::NullableWString | WireType::NullableBytes)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::UInt32 => "UInt32",
            WireType::WString => "WideString",
            WireType::NullableWString => "nullable WideString",
            WireType::Bytes => "ByteBuffer",
            WireType::NullableBytes => "nullable ByteBuffer",
        };
        f.write_str(name)
    }
}

/// A field value, used for both requests and responses.
///
/// `None` inside `WString`/`Bytes` is a null pointer on the wire. A present
/// empty buffer (`Some` of length 0) is a different value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    UInt32(u32),
    WString(Option<String>),
    Bytes(Option<Bytes>),
}

impl WireValue {
    /// A present wide string
    pub fn wstring(value: impl Into<String>) -> Self {
        WireValue::WString(Some(value.into()))
    }

    /// A present byte buffer
    pub fn bytes(value: impl Into<Bytes>) -> Self {
        WireValue::Bytes(Some(value.into()))
    }

    /// Whether this value can be placed in a field of type `ty`
    pub fn fits(&self, ty: WireType) -> bool {
        match (self, ty) {
            (WireValue::UInt32(_), WireType::UInt32) => true,
            (WireValue::WString(Some(_)), WireType::WString) => true,
            (WireValue::WString(_), WireType::NullableWString) => true,
            (WireValue::Bytes(Some(_)), WireType::Bytes) => true,
            (WireValue::Bytes(_), WireType::NullableBytes) => true,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::WString(None) | WireValue::Bytes(None))
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            WireValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// The string, or `None` when null or not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::WString(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// The buffer, or `None` when null or not a buffer
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            WireValue::Bytes(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Type name for error messages, e.g. "null ByteBuffer"
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::UInt32(_) => "UInt32",
            WireValue::WString(Some(_)) => "WideString",
            WireValue::WString(None) => "null WideString",
            WireValue::Bytes(Some(_)) => "ByteBuffer",
            WireValue::Bytes(None) => "null ByteBuffer",
        }
    }
}

impl From<u32> for WireValue {
    fn from(value: u32) -> Self {
        WireValue::UInt32(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::wstring(value)
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::wstring(value)
    }
}

impl From<Bytes> for WireValue {
    fn from(value: Bytes) -> Self {
        WireValue::bytes(value)
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(value: Vec<u8>) -> Self {
        WireValue::bytes(value)
    }
}

//! NDR Module
//!
//! Encodes and decodes the primitive wire types carried in request and
//! response stubs (NDR 2.0, little-endian). Alignment is always measured
//! from the start of the stub buffer.
//!
//! ## Primitive Layouts
//!
//! ### UInt32 (aligned to 4)
//! ```text
//! ┌──────────┐
//! │ LE (4)   │
//! └──────────┘
//! ```
//!
//! ### WideString (conformant varying, aligned to 4)
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────────────────┐
//! │ Max (4)  │ Off (4)  │ Act (4)  │ UTF-16LE units, NUL included │
//! └──────────┴──────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! ### ByteBuffer (conformant array, aligned to 4)
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │       Raw bytes             │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Nullable (unique pointer)
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Ref (4)  │ Referent (only if Ref != 0) │
//! └──────────┴─────────────────────────────┘
//! ```

mod codec;
mod value;

pub use codec::{
    encode_bytes, encode_referent, encode_uint32, encode_wstring, NdrReader, NdrWriter,
    FIRST_REFERENT_ID,
};
pub use value::{WireType, WireValue};

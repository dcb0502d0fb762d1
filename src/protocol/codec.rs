//! Stub marshaling
//!
//! Encodes request fields and decodes response fields against an
//! [`OperationDescriptor`]. Fields are laid out back to back in declared
//! order; see [`crate::ndr`] for the primitive layouts.
//!
//! ## Example: UploadFile request stub
//! ```text
//! ┌──────────────────────┬─────────────┬──────────────────────────┐
//! │ remotePath (WString) │ fileSize(4) │ fileData (Len(4) + data) │
//! └──────────────────────┴─────────────┴──────────────────────────┘
//! ```

use bytes::Bytes;

use super::{OperationDescriptor, Request, ResponseValues};
use crate::error::{CallError, CodecError};
use crate::ndr::{NdrReader, NdrWriter, WireValue};

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request stub
///
/// Fails with `SchemaMismatch` if the supplied fields do not match the
/// descriptor's request shape in name, order and type.
pub fn encode_request(op: &OperationDescriptor, request: &Request) -> Result<Bytes, CallError> {
    let fields = request.fields();
    if fields.len() != op.request_fields.len() {
        return Err(CallError::SchemaMismatch(format!(
            "{} takes {} request fields, got {}",
            op.name,
            op.request_fields.len(),
            fields.len()
        )));
    }

    let mut writer = NdrWriter::new();
    for (field, (name, value)) in op.request_fields.iter().zip(fields) {
        if field.name != name {
            return Err(CallError::SchemaMismatch(format!(
                "{}: expected field '{}', got '{}'",
                op.name, field.name, name
            )));
        }
        check_representable(op, field.name, value)?;

        writer.encode_value(field.ty, value).map_err(|e| {
            CallError::SchemaMismatch(format!("{}.{}: {}", op.name, field.name, e))
        })?;
    }

    Ok(writer.finish())
}

/// Values the wire cannot carry faithfully
fn check_representable(
    op: &OperationDescriptor,
    name: &str,
    value: &WireValue,
) -> Result<(), CallError> {
    match value {
        WireValue::WString(Some(s)) if s.contains('\0') => Err(CallError::SchemaMismatch(
            format!("{}.{}: string contains an embedded NUL", op.name, name),
        )),
        WireValue::Bytes(Some(b)) if u32::try_from(b.len()).is_err() => {
            Err(CallError::SchemaMismatch(format!(
                "{}.{}: {} bytes exceeds the u32 length prefix",
                op.name,
                name,
                b.len()
            )))
        }
        _ => Ok(()),
    }
}

/// Decode a request stub (server side of a call)
pub fn decode_request(op: &OperationDescriptor, stub: Bytes) -> Result<Request, CodecError> {
    let mut reader = NdrReader::new(stub);
    let mut request = Request::new();
    for field in op.request_fields {
        request = request.field(field.name, reader.decode_value(field.ty)?);
    }
    reader.finish()?;
    Ok(request)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response stub from values in declared order
pub fn encode_response(op: &OperationDescriptor, values: &[WireValue]) -> Result<Bytes, CodecError> {
    if values.len() != op.response_fields.len() {
        return Err(CodecError::InvalidConformance(format!(
            "{} returns {} fields, got {}",
            op.name,
            op.response_fields.len(),
            values.len()
        )));
    }

    let mut writer = NdrWriter::new();
    for (field, value) in op.response_fields.iter().zip(values) {
        writer.encode_value(field.ty, value)?;
    }
    Ok(writer.finish())
}

/// Decode a response stub
///
/// Any truncation, bad conformance or leftover bytes is `MalformedResponse`.
pub fn decode_response(op: &OperationDescriptor, stub: Bytes) -> Result<ResponseValues, CallError> {
    let mut reader = NdrReader::new(stub);
    let mut fields = Vec::with_capacity(op.response_fields.len());

    for field in op.response_fields {
        let value = reader.decode_value(field.ty).map_err(|e| {
            CallError::MalformedResponse(format!("{}.{}: {}", op.name, field.name, e))
        })?;
        fields.push((field.name, value));
    }
    reader
        .finish()
        .map_err(|e| CallError::MalformedResponse(format!("{}: {}", op.name, e)))?;

    Ok(ResponseValues::new(op.operation, fields))
}

//! DCE/RPC connection-oriented PDUs
//!
//! ## Common Header (16 bytes)
//! ```text
//! ┌─────┬───────┬───────┬───────┬──────────┬──────────┬──────────┬──────────┐
//! │Ver 5│Minor 0│ PType │ Flags │ DRep (4) │ FragLen  │ AuthLen  │ CallId   │
//! │ (1) │  (1)  │  (1)  │  (1)  │          │   (2)    │   (2)    │   (4)    │
//! └─────┴───────┴───────┴───────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! ### Request body
//! ```text
//! ┌───────────────┬────────────┬──────────┬─────────────────┐
//! │ AllocHint (4) │ CtxId (2)  │ Opnum(2) │   Stub data     │
//! └───────────────┴────────────┴──────────┴─────────────────┘
//! ```
//!
//! ### Response body
//! ```text
//! ┌───────────────┬────────────┬─────────┬─────────┬─────────────────┐
//! │ AllocHint (4) │ CtxId (2)  │Cancel(1)│ Rsvd(1) │   Stub data     │
//! └───────────────┴────────────┴─────────┴─────────┴─────────────────┘
//! ```

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{InterfaceId, SyntaxId};
use crate::error::TransportError;

/// Common header size
pub const HEADER_SIZE: usize = 16;

/// Header plus request/response body prefix
pub const REQUEST_HEADER_SIZE: usize = 24;

/// Little-endian integers, ASCII characters, IEEE floats
pub const DREP_LE: [u8; 4] = [0x10, 0x00, 0x00, 0x00];

/// First fragment of a call
pub const PFC_FIRST_FRAG: u8 = 0x01;

/// Last fragment of a call
pub const PFC_LAST_FRAG: u8 = 0x02;

/// Fault status for an opnum the server does not export
pub const NCA_S_OP_RNG_ERROR: u32 = 0x1c01_0002;

/// bind_ack result: presentation context accepted
pub const RESULT_ACCEPTANCE: u16 = 0;

/// bind_ack result: rejected by provider
pub const RESULT_PROVIDER_REJECTION: u16 = 2;

/// bind_ack reason: abstract syntax not supported
pub const REASON_ABSTRACT_SYNTAX_NOT_SUPPORTED: u16 = 1;

/// Packet types used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Request = 0,
    Response = 2,
    Fault = 3,
    Bind = 11,
    BindAck = 12,
    BindNak = 13,
}

impl PacketType {
    fn from_u8(value: u8) -> Result<Self, TransportError> {
        match value {
            0 => Ok(PacketType::Request),
            2 => Ok(PacketType::Response),
            3 => Ok(PacketType::Fault),
            11 => Ok(PacketType::Bind),
            12 => Ok(PacketType::BindAck),
            13 => Ok(PacketType::BindNak),
            other => Err(TransportError::Protocol(format!(
                "unsupported packet type {}",
                other
            ))),
        }
    }
}

/// Decoded common header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub ptype: PacketType,
    pub flags: u8,
    pub frag_length: u16,
    pub call_id: u32,
}

impl PduHeader {
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Result<Self, TransportError> {
        if raw[0] != 5 || raw[1] != 0 {
            return Err(TransportError::Protocol(format!(
                "unsupported rpc version {}.{}",
                raw[0], raw[1]
            )));
        }
        if raw[4] & 0xF0 != DREP_LE[0] {
            return Err(TransportError::Protocol(
                "big-endian data representation is not supported".to_string(),
            ));
        }

        let frag_length = u16::from_le_bytes([raw[8], raw[9]]);
        let auth_length = u16::from_le_bytes([raw[10], raw[11]]);
        if (frag_length as usize) < HEADER_SIZE {
            return Err(TransportError::Protocol(format!(
                "fragment length {} shorter than header",
                frag_length
            )));
        }
        if auth_length != 0 {
            return Err(TransportError::Protocol(format!(
                "unexpected auth trailer of {} bytes",
                auth_length
            )));
        }

        Ok(Self {
            ptype: PacketType::from_u8(raw[2])?,
            flags: raw[3],
            frag_length,
            call_id: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        })
    }

    pub fn is_last(&self) -> bool {
        self.flags & PFC_LAST_FRAG != 0
    }
}

/// A connection-oriented PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Bind {
        call_id: u32,
        max_xmit_frag: u16,
        max_recv_frag: u16,
        assoc_group: u32,
        abstract_syntax: SyntaxId,
        transfer_syntax: SyntaxId,
    },
    BindAck {
        call_id: u32,
        max_xmit_frag: u16,
        max_recv_frag: u16,
        assoc_group: u32,
        sec_addr: String,
        result: u16,
        reason: u16,
        transfer_syntax: SyntaxId,
    },
    BindNak {
        call_id: u32,
        reason: u16,
    },
    Request {
        call_id: u32,
        flags: u8,
        alloc_hint: u32,
        context_id: u16,
        opnum: u16,
        stub: Bytes,
    },
    Response {
        call_id: u32,
        flags: u8,
        alloc_hint: u32,
        context_id: u16,
        stub: Bytes,
    },
    Fault {
        call_id: u32,
        status: u32,
    },
}

// =============================================================================
// Encoding
// =============================================================================

fn put_syntax(buf: &mut BytesMut, syntax: &SyntaxId) {
    buf.put_slice(&syntax.uuid.to_bytes_le());
    buf.put_u16_le(syntax.version);
    buf.put_u16_le(syntax.version_minor);
}

impl Pdu {
    pub fn call_id(&self) -> u32 {
        match self {
            Pdu::Bind { call_id, .. }
            | Pdu::BindAck { call_id, .. }
            | Pdu::BindNak { call_id, .. }
            | Pdu::Request { call_id, .. }
            | Pdu::Response { call_id, .. }
            | Pdu::Fault { call_id, .. } => *call_id,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Pdu::Bind { .. } => PacketType::Bind,
            Pdu::BindAck { .. } => PacketType::BindAck,
            Pdu::BindNak { .. } => PacketType::BindNak,
            Pdu::Request { .. } => PacketType::Request,
            Pdu::Response { .. } => PacketType::Response,
            Pdu::Fault { .. } => PacketType::Fault,
        }
    }

    fn flags(&self) -> u8 {
        match self {
            Pdu::Request { flags, .. } | Pdu::Response { flags, .. } => *flags,
            _ => PFC_FIRST_FRAG | PFC_LAST_FRAG,
        }
    }

    /// Encode the PDU, header included
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();

        match self {
            Pdu::Bind {
                max_xmit_frag,
                max_recv_frag,
                assoc_group,
                abstract_syntax,
                transfer_syntax,
                ..
            } => {
                body.put_u16_le(*max_xmit_frag);
                body.put_u16_le(*max_recv_frag);
                body.put_u32_le(*assoc_group);
                body.put_u8(1); // n_context_elem
                body.put_bytes(0, 3);
                body.put_u16_le(0); // p_cont_id
                body.put_u8(1); // n_transfer_syn
                body.put_u8(0);
                put_syntax(&mut body, abstract_syntax);
                put_syntax(&mut body, transfer_syntax);
            }
            Pdu::BindAck {
                max_xmit_frag,
                max_recv_frag,
                assoc_group,
                sec_addr,
                result,
                reason,
                transfer_syntax,
                ..
            } => {
                body.put_u16_le(*max_xmit_frag);
                body.put_u16_le(*max_recv_frag);
                body.put_u32_le(*assoc_group);
                let addr_len = sec_addr.len() + 1;
                body.put_u16_le(addr_len as u16);
                body.put_slice(sec_addr.as_bytes());
                body.put_u8(0);
                let pad = (4 - (HEADER_SIZE + body.len()) % 4) % 4;
                body.put_bytes(0, pad);
                body.put_u8(1); // n_results
                body.put_bytes(0, 3);
                body.put_u16_le(*result);
                body.put_u16_le(*reason);
                put_syntax(&mut body, transfer_syntax);
            }
            Pdu::BindNak { reason, .. } => {
                body.put_u16_le(*reason);
                body.put_u8(0); // no protocol versions listed
            }
            Pdu::Request {
                alloc_hint,
                context_id,
                opnum,
                stub,
                ..
            } => {
                body.put_u32_le(*alloc_hint);
                body.put_u16_le(*context_id);
                body.put_u16_le(*opnum);
                body.put_slice(stub);
            }
            Pdu::Response {
                alloc_hint,
                context_id,
                stub,
                ..
            } => {
                body.put_u32_le(*alloc_hint);
                body.put_u16_le(*context_id);
                body.put_u8(0); // cancel_count
                body.put_u8(0);
                body.put_slice(stub);
            }
            Pdu::Fault { status, .. } => {
                body.put_u32_le(0);
                body.put_u16_le(0);
                body.put_u8(0);
                body.put_u8(0);
                body.put_u32_le(*status);
                body.put_u32_le(0);
            }
        }

        let mut out = BytesMut::with_capacity(HEADER_SIZE + body.len());
        out.put_u8(5);
        out.put_u8(0);
        out.put_u8(self.packet_type() as u8);
        out.put_u8(self.flags());
        out.put_slice(&DREP_LE);
        out.put_u16_le((HEADER_SIZE + body.len()) as u16);
        out.put_u16_le(0); // auth_length
        out.put_u32_le(self.call_id());
        out.put_slice(&body);
        out.freeze()
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Bounds-checked reads over a PDU body
struct Body<'a> {
    raw: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Body<'a> {
    fn new(raw: &'a [u8], what: &'static str) -> Self {
        Self { raw, pos: 0, what }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransportError> {
        if self.raw.len() - self.pos < n {
            return Err(TransportError::Protocol(format!(
                "{} body truncated at offset {}",
                self.what, self.pos
            )));
        }
        let out = &self.raw[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, TransportError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, TransportError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> Result<u32, TransportError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn syntax(&mut self) -> Result<SyntaxId, TransportError> {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(self.take(16)?);
        Ok(SyntaxId {
            uuid: InterfaceId::from_bytes_le(&uuid),
            version: self.u16()?,
            version_minor: self.u16()?,
        })
    }

    fn rest(&self) -> &'a [u8] {
        &self.raw[self.pos..]
    }
}

impl Pdu {
    /// Decode a PDU body given its already-parsed header
    pub fn decode(header: PduHeader, body: &[u8]) -> Result<Pdu, TransportError> {
        let call_id = header.call_id;

        let pdu = match header.ptype {
            PacketType::Bind => {
                let mut b = Body::new(body, "bind");
                let max_xmit_frag = b.u16()?;
                let max_recv_frag = b.u16()?;
                let assoc_group = b.u32()?;
                let n_context = b.u8()?;
                b.take(3)?;
                if n_context == 0 {
                    return Err(TransportError::Protocol(
                        "bind carries no presentation context".to_string(),
                    ));
                }
                b.u16()?; // p_cont_id
                let n_transfer = b.u8()?;
                b.u8()?;
                let abstract_syntax = b.syntax()?;
                if n_transfer == 0 {
                    return Err(TransportError::Protocol(
                        "bind context has no transfer syntax".to_string(),
                    ));
                }
                let transfer_syntax = b.syntax()?;
                Pdu::Bind {
                    call_id,
                    max_xmit_frag,
                    max_recv_frag,
                    assoc_group,
                    abstract_syntax,
                    transfer_syntax,
                }
            }
            PacketType::BindAck => {
                let mut b = Body::new(body, "bind_ack");
                let max_xmit_frag = b.u16()?;
                let max_recv_frag = b.u16()?;
                let assoc_group = b.u32()?;
                let addr_len = b.u16()? as usize;
                let addr = b.take(addr_len)?;
                let sec_addr = String::from_utf8_lossy(addr)
                    .trim_end_matches('\0')
                    .to_string();
                let pad = (4 - (HEADER_SIZE + b.pos) % 4) % 4;
                b.take(pad)?;
                let n_results = b.u8()?;
                b.take(3)?;
                if n_results == 0 {
                    return Err(TransportError::Protocol(
                        "bind_ack carries no result".to_string(),
                    ));
                }
                let result = b.u16()?;
                let reason = b.u16()?;
                let transfer_syntax = b.syntax()?;
                Pdu::BindAck {
                    call_id,
                    max_xmit_frag,
                    max_recv_frag,
                    assoc_group,
                    sec_addr,
                    result,
                    reason,
                    transfer_syntax,
                }
            }
            PacketType::BindNak => {
                let mut b = Body::new(body, "bind_nak");
                Pdu::BindNak {
                    call_id,
                    reason: b.u16()?,
                }
            }
            PacketType::Request => {
                let mut b = Body::new(body, "request");
                let alloc_hint = b.u32()?;
                let context_id = b.u16()?;
                let opnum = b.u16()?;
                Pdu::Request {
                    call_id,
                    flags: header.flags,
                    alloc_hint,
                    context_id,
                    opnum,
                    stub: Bytes::copy_from_slice(b.rest()),
                }
            }
            PacketType::Response => {
                let mut b = Body::new(body, "response");
                let alloc_hint = b.u32()?;
                let context_id = b.u16()?;
                b.take(2)?; // cancel_count, reserved
                Pdu::Response {
                    call_id,
                    flags: header.flags,
                    alloc_hint,
                    context_id,
                    stub: Bytes::copy_from_slice(b.rest()),
                }
            }
            PacketType::Fault => {
                let mut b = Body::new(body, "fault");
                b.take(8)?; // alloc_hint, p_cont_id, cancel_count, reserved
                Pdu::Fault {
                    call_id,
                    status: b.u32()?,
                }
            }
        };

        Ok(pdu)
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

fn map_read_error(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Io(err),
    }
}

/// Read one complete PDU from a stream
///
/// Blocks until a full fragment is received or an error occurs
pub fn read_pdu<R: Read>(reader: &mut R) -> Result<(PduHeader, Pdu), TransportError> {
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw).map_err(map_read_error)?;
    let header = PduHeader::decode(&raw)?;

    let mut body = vec![0u8; header.frag_length as usize - HEADER_SIZE];
    reader.read_exact(&mut body).map_err(map_read_error)?;

    let pdu = Pdu::decode(header, &body)?;
    Ok((header, pdu))
}

/// Write a PDU to a stream
pub fn write_pdu<W: Write>(writer: &mut W, pdu: &Pdu) -> Result<(), TransportError> {
    writer.write_all(&pdu.encode())?;
    Ok(())
}

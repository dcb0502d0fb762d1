//! Network Module
//!
//! Connection-oriented DCE/RPC over TCP (ncacn_ip_tcp).
//!
//! ## Architecture
//! - [`Connector`] opens a [`Transport`] for an endpoint
//! - [`Transport`] binds the interface, then carries one call at a time
//! - [`TcpConnector`]/[`TcpTransport`] are the production implementation
//!
//! No authentication is negotiated; `auth_length` is always 0.

mod connection;
pub mod pdu;

use std::fmt;

pub use connection::{TcpConnector, TcpTransport};

use crate::config::Endpoint;
use crate::error::{BindFailure, TransportError};

/// Opens transports; one per session connect.
pub trait Connector {
    type Transport: Transport;

    /// Open a stream to `endpoint`. No bytes are exchanged yet.
    fn open(&self, endpoint: &Endpoint) -> Result<Self::Transport, TransportError>;
}

/// A single RPC association.
pub trait Transport: Send {
    /// Perform the bind handshake for `interface`.
    fn bind(&mut self, interface: &SyntaxId) -> Result<(), BindFailure>;

    /// Send a request stub for `opnum` and block for the full response stub.
    fn send_and_receive(&mut self, opnum: u16, stub: &[u8]) -> Result<bytes::Bytes, TransportError>;

    /// Tear down the association. Safe to call more than once.
    fn close(&mut self);
}

/// A 128-bit DCE UUID in its field form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl InterfaceId {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Wire form: first three fields little-endian, last eight bytes as-is
    pub fn to_bytes_le(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..16].copy_from_slice(&self.data4);
        out
    }

    pub fn from_bytes_le(raw: &[u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&raw[8..16]);
        Self {
            data1: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            data2: u16::from_le_bytes([raw[4], raw[5]]),
            data3: u16::from_le_bytes([raw[6], raw[7]]),
            data4,
        }
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

/// Interface or transfer syntax: UUID plus major/minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxId {
    pub uuid: InterfaceId,
    pub version: u16,
    pub version_minor: u16,
}

impl fmt::Display for SyntaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}.{}", self.uuid, self.version, self.version_minor)
    }
}

/// NDR 2.0 transfer syntax
pub const NDR_TRANSFER_SYNTAX: SyntaxId = SyntaxId {
    uuid: InterfaceId::new(
        0x8a88_5d04,
        0x1ceb,
        0x11c9,
        [0x9f, 0xe8, 0x08, 0x00, 0x2b, 0x10, 0x48, 0x60],
    ),
    version: 2,
    version_minor: 0,
};

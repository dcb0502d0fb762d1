//! Error types for rpcmotion
//!
//! The taxonomy is split along the points where a failure can occur:
//!
//! - [`ConnectError`]: opening the TCP stream or binding the interface
//! - [`CallError`]: one request/response round trip on a bound session
//! - [`TransportError`]: what the network layer reports underneath a call
//! - [`CodecError`]: NDR decoding, surfaced to callers as `MalformedResponse`
//! - [`ClientError`]: the convenience layer, which also touches local files

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Endpoint;
use crate::ndr::WireType;

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

// =============================================================================
// Session Errors
// =============================================================================

/// Failure to establish a session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The stream could not be opened, or dropped during the handshake.
    #[error("transport unavailable for {endpoint}: {source}")]
    TransportUnavailable {
        endpoint: Endpoint,
        #[source]
        source: TransportError,
    },

    /// The remote endpoint refused the interface identifier.
    #[error("bind rejected by server: {reason}")]
    BindRejected { reason: BindRejectReason },
}

/// Failure of a single call.
///
/// `NotConnected` and `SchemaMismatch` are raised before any byte is sent.
/// `MalformedResponse` and `TransportFailure` happen after bytes were
/// exchanged, so the remote side may have acted on the request.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("session is not connected")]
    NotConnected,

    #[error("request does not match operation schema: {0}")]
    SchemaMismatch(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
}

impl From<CodecError> for CallError {
    fn from(err: CodecError) -> Self {
        CallError::MalformedResponse(err.to_string())
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by a [`Transport`](crate::network::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server runtime answered with a fault PDU.
    #[error("rpc fault: status 0x{status:08x}")]
    Fault { status: u32 },

    /// A PDU violated the connection-oriented protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed by peer")]
    Closed,
}

/// Outcome of a failed bind handshake.
#[derive(Debug, Error)]
pub enum BindFailure {
    #[error("bind rejected: {0}")]
    Rejected(BindRejectReason),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Why the server refused a bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindRejectReason {
    /// `bind_nak` with the provider reject reason.
    Nak(u16),

    /// `bind_ack` whose presentation context result was not acceptance.
    ContextRejected { result: u16, reason: u16 },
}

impl std::fmt::Display for BindRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindRejectReason::Nak(reason) => write!(f, "bind_nak (reason {})", reason),
            BindRejectReason::ContextRejected { result, reason } => write!(
                f,
                "presentation context rejected (result {}, reason {})",
                result, reason
            ),
        }
    }
}

// =============================================================================
// Codec Errors
// =============================================================================

/// NDR decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("buffer truncated: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid conformance: {0}")]
    InvalidConformance(String),

    #[error("string has no terminator within {0} code units")]
    MissingTerminator(usize),

    #[error("string is not valid UTF-16")]
    InvalidUtf16,

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    /// Encoding side: the value does not fit the declared field type.
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: WireType,
        found: &'static str,
    },
}

// =============================================================================
// Client Errors
// =============================================================================

/// Unified error type for the convenience client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is {size} bytes, larger than the 4 GiB transfer limit")]
    FileTooLarge { path: PathBuf, size: u64 },

    /// The server reported success for a download but sent no buffer.
    #[error("server reported success but sent no file data")]
    MissingFileData,

    #[error("server reported {declared} bytes but sent {received}")]
    SizeMismatch { declared: u32, received: usize },

    #[error("unexpected ping reply (status {status}, response {response:?})")]
    UnexpectedPing {
        status: u32,
        response: Option<String>,
    },
}

impl ClientError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ClientError::Io {
            path: path.into(),
            source,
        }
    }
}

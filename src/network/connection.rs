//! TCP Transport
//!
//! Carries bind and request/response PDUs over a single TCP stream.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::pdu::{
    read_pdu, write_pdu, Pdu, PFC_FIRST_FRAG, PFC_LAST_FRAG, REQUEST_HEADER_SIZE,
    RESULT_ACCEPTANCE,
};
use super::{Connector, SyntaxId, Transport, NDR_TRANSFER_SYNTAX};
use crate::config::{Config, Endpoint};
use crate::error::{BindFailure, BindRejectReason, TransportError};

/// Cap on response preallocation taken from an untrusted alloc_hint
const MAX_ALLOC_HINT: usize = 16 * 1024 * 1024;

/// Presentation context negotiated at bind time
const CONTEXT_ID: u16 = 0;

/// Opens [`TcpTransport`]s with the configured timeouts and fragment sizes
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    max_xmit_frag: u16,
    max_recv_frag: u16,
}

impl TcpConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            max_xmit_frag: config.max_xmit_frag,
            max_recv_frag: config.max_recv_frag,
        }
    }

    fn connect_stream(&self, endpoint: &Endpoint) -> Result<TcpStream, TransportError> {
        let Some(timeout) = self.connect_timeout else {
            return Ok(TcpStream::connect((endpoint.host.as_str(), endpoint.port))?);
        };

        // connect_timeout takes a single address, so try each resolved one
        let mut last_err = None;
        for addr in (endpoint.host.as_str(), endpoint.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} resolved to no addresses", endpoint.host),
                )
            })
            .into())
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn open(&self, endpoint: &Endpoint) -> Result<TcpTransport, TransportError> {
        let stream = self.connect_stream(endpoint)?;
        let mut transport = TcpTransport::new(stream, self.max_xmit_frag, self.max_recv_frag)?;
        transport.set_timeouts(self.read_timeout, self.write_timeout)?;
        Ok(transport)
    }
}

/// A DCE/RPC association over one TCP stream
pub struct TcpTransport {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,

    next_call_id: u32,
    max_xmit_frag: u16,
    max_recv_frag: u16,
    closed: bool,
}

impl TcpTransport {
    /// Wrap a connected stream
    ///
    /// Sets up buffered I/O; fragment sizes are what we offer at bind time.
    pub fn new(stream: TcpStream, max_xmit_frag: u16, max_recv_frag: u16) -> Result<Self, TransportError> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm; every call is a short request/response
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            peer_addr,
            next_call_id: 1,
            max_xmit_frag,
            max_recv_frag,
            closed: false,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(
        &mut self,
        read: Option<Duration>,
        write: Option<Duration>,
    ) -> Result<(), TransportError> {
        self.reader.get_ref().set_read_timeout(read)?;
        self.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Fragment size negotiated for outgoing PDUs
    pub fn max_xmit_frag(&self) -> u16 {
        self.max_xmit_frag
    }

    fn next_call_id(&mut self) -> u32 {
        let id = self.next_call_id;
        self.next_call_id = self.next_call_id.wrapping_add(1).max(1);
        id
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn send_request(&mut self, call_id: u32, opnum: u16, stub: &[u8]) -> Result<(), TransportError> {
        // Every fragment but the last carries a multiple of 8 stub bytes
        let max_body = ((self.max_xmit_frag as usize).saturating_sub(REQUEST_HEADER_SIZE) & !7)
            .max(8);

        let mut offset = 0;
        loop {
            let end = (offset + max_body).min(stub.len());
            let mut flags = 0;
            if offset == 0 {
                flags |= PFC_FIRST_FRAG;
            }
            if end == stub.len() {
                flags |= PFC_LAST_FRAG;
            }

            let pdu = Pdu::Request {
                call_id,
                flags,
                alloc_hint: (stub.len() - offset) as u32,
                context_id: CONTEXT_ID,
                opnum,
                stub: Bytes::copy_from_slice(&stub[offset..end]),
            };
            tracing::trace!(
                "-> request call_id={} opnum={} flags={:#04x} bytes={}",
                call_id,
                opnum,
                flags,
                end - offset
            );
            write_pdu(&mut self.writer, &pdu)?;

            offset = end;
            if offset == stub.len() {
                break;
            }
        }

        self.writer.flush()?;
        Ok(())
    }

    fn receive_response(&mut self, call_id: u32) -> Result<Bytes, TransportError> {
        let mut stub = BytesMut::new();
        let mut first = true;

        loop {
            let (header, pdu) = read_pdu(&mut self.reader)?;
            if pdu.call_id() != call_id {
                return Err(TransportError::Protocol(format!(
                    "response for call {} while waiting on call {}",
                    pdu.call_id(),
                    call_id
                )));
            }

            match pdu {
                Pdu::Response {
                    alloc_hint,
                    stub: fragment,
                    ..
                } => {
                    if first {
                        stub.reserve((alloc_hint as usize).min(MAX_ALLOC_HINT));
                        first = false;
                    }
                    if header.frag_length > self.max_recv_frag {
                        tracing::debug!(
                            "Fragment of {} bytes exceeds negotiated {}",
                            header.frag_length,
                            self.max_recv_frag
                        );
                    }
                    tracing::trace!(
                        "<- response call_id={} flags={:#04x} bytes={}",
                        call_id,
                        header.flags,
                        fragment.len()
                    );
                    stub.extend_from_slice(&fragment);
                    if header.is_last() {
                        return Ok(stub.freeze());
                    }
                }
                Pdu::Fault { status, .. } => {
                    return Err(TransportError::Fault { status });
                }
                other => {
                    return Err(TransportError::Protocol(format!(
                        "unexpected {:?} PDU during call",
                        other.packet_type()
                    )));
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn bind(&mut self, interface: &SyntaxId) -> Result<(), BindFailure> {
        self.ensure_open()?;
        let call_id = self.next_call_id();

        let bind = Pdu::Bind {
            call_id,
            max_xmit_frag: self.max_xmit_frag,
            max_recv_frag: self.max_recv_frag,
            assoc_group: 0,
            abstract_syntax: *interface,
            transfer_syntax: NDR_TRANSFER_SYNTAX,
        };
        tracing::trace!("-> bind call_id={} interface={}", call_id, interface);
        write_pdu(&mut self.writer, &bind)?;
        self.writer.flush().map_err(TransportError::from)?;

        let (_, reply) = read_pdu(&mut self.reader)?;
        match reply {
            Pdu::BindAck {
                max_xmit_frag,
                max_recv_frag,
                result,
                reason,
                ..
            } => {
                if result != RESULT_ACCEPTANCE {
                    return Err(BindFailure::Rejected(BindRejectReason::ContextRejected {
                        result,
                        reason,
                    }));
                }
                // The server's receive limit bounds what we may send
                self.max_xmit_frag = self.max_xmit_frag.min(max_recv_frag);
                self.max_recv_frag = self.max_recv_frag.min(max_xmit_frag);
                tracing::debug!(
                    "Bound {} on {} (xmit {}, recv {})",
                    interface,
                    self.peer_addr,
                    self.max_xmit_frag,
                    self.max_recv_frag
                );
                Ok(())
            }
            Pdu::BindNak { reason, .. } => {
                Err(BindFailure::Rejected(BindRejectReason::Nak(reason)))
            }
            other => Err(TransportError::Protocol(format!(
                "unexpected {:?} PDU in reply to bind",
                other.packet_type()
            ))
            .into()),
        }
    }

    fn send_and_receive(&mut self, opnum: u16, stub: &[u8]) -> Result<Bytes, TransportError> {
        self.ensure_open()?;
        let call_id = self.next_call_id();
        self.send_request(call_id, opnum, stub)?;
        self.receive_response(call_id)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.writer.flush();
        if let Err(e) = self.writer.get_ref().shutdown(std::net::Shutdown::Both) {
            tracing::trace!("Shutdown of {} failed: {}", self.peer_addr, e);
        }
        tracing::debug!("Closed connection to {}", self.peer_addr);
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

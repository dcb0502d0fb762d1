//! Session Module
//!
//! Owns one transport connection and orchestrates calls over it.
//!
//! ## Responsibilities
//! - Open the transport and bind the interface
//! - Validate and encode requests against the operation catalog
//! - Run exactly one call at a time on the wire
//! - Decode responses and hand back the remote status unchanged

use parking_lot::Mutex;

use crate::config::Endpoint;
use crate::error::{BindFailure, CallError, ConnectError};
use crate::network::{Connector, TcpConnector, Transport};
use crate::protocol::{
    decode_response, encode_request, Operation, OperationDescriptor, Request, ResponseValues,
    INTERFACE,
};

/// Connection state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,

    /// A transport failure tore the connection down mid-call; the remote
    /// side's state is unknown. Calls fail with `NotConnected` until the
    /// session is connected again.
    Failed,
}

struct Inner<T> {
    state: SessionState,
    transport: Option<T>,
    endpoint: Option<Endpoint>,
}

impl<T: Transport> Inner<T> {
    fn teardown(&mut self, state: SessionState) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = state;
    }
}

/// A client session
///
/// ## Concurrency Model: one call on the wire
///
/// All state sits behind a single `Mutex`. `call` holds it for the whole
/// encode/send/receive/decode sequence, so calls from several threads on a
/// shared session queue up and never interleave their bytes. The lock is
/// also what `connect` and `disconnect` take, so a teardown waits for the
/// in-flight call to finish.
pub struct Session<C: Connector = TcpConnector> {
    connector: C,
    inner: Mutex<Inner<C::Transport>>,
}

impl Session<TcpConnector> {
    /// Session over TCP with the default timeouts
    pub fn tcp() -> Self {
        Self::new(TcpConnector::default())
    }
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                transport: None,
                endpoint: None,
            }),
        }
    }

    /// Open the transport and bind the interface
    ///
    /// An existing connection is closed first.
    pub fn connect(&self, endpoint: &Endpoint) -> Result<(), ConnectError> {
        let mut inner = self.inner.lock();
        if inner.transport.is_some() {
            tracing::debug!("Replacing existing connection before connecting to {}", endpoint);
            inner.teardown(SessionState::Disconnected);
        }
        inner.endpoint = None;

        let mut transport = self.connector.open(endpoint).map_err(|source| {
            ConnectError::TransportUnavailable {
                endpoint: endpoint.clone(),
                source,
            }
        })?;

        if let Err(failure) = transport.bind(&INTERFACE) {
            transport.close();
            return Err(match failure {
                BindFailure::Rejected(reason) => {
                    tracing::warn!("Bind to {} rejected: {}", endpoint, reason);
                    ConnectError::BindRejected { reason }
                }
                BindFailure::Transport(source) => ConnectError::TransportUnavailable {
                    endpoint: endpoint.clone(),
                    source,
                },
            });
        }

        tracing::info!("Connected to {}", endpoint);
        inner.transport = Some(transport);
        inner.endpoint = Some(endpoint.clone());
        inner.state = SessionState::Connected;
        Ok(())
    }

    /// Run one call
    ///
    /// 1. Require a connected session
    /// 2. Encode the request against `op`'s request shape
    /// 3. Send it under `op.opnum` and block for the response
    /// 4. Decode the response against `op`'s response shape
    ///
    /// A transport failure closes the connection and leaves the session
    /// `Failed`.
    pub fn call(
        &self,
        op: &OperationDescriptor,
        request: &Request,
    ) -> Result<ResponseValues, CallError> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Connected {
            return Err(CallError::NotConnected);
        }
        let stub = encode_request(op, request)?;

        let result = match inner.transport.as_mut() {
            Some(transport) => transport.send_and_receive(op.opnum, &stub),
            None => return Err(CallError::NotConnected),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} failed on the wire, dropping session: {}", op.name, e);
                inner.teardown(SessionState::Failed);
                return Err(CallError::TransportFailure(e));
            }
        };

        tracing::debug!(
            "{} (opnum {}): sent {} bytes, received {} bytes",
            op.name,
            op.opnum,
            stub.len(),
            response.len()
        );
        decode_response(op, response)
    }

    /// `call` by operation
    pub fn invoke(&self, operation: Operation, request: &Request) -> Result<ResponseValues, CallError> {
        self.call(operation.descriptor(), request)
    }

    /// Close the transport if open. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        if inner.transport.is_some() {
            if let Some(endpoint) = &inner.endpoint {
                tracing::info!("Disconnecting from {}", endpoint);
            }
        }
        inner.teardown(SessionState::Disconnected);
        inner.endpoint = None;
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Endpoint last connected to; kept after a failure, cleared by `disconnect`
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.lock().endpoint.clone()
    }
}

//! Transport Tests
//!
//! Tests for the TCP transport against the loopback server:
//! - Bind acceptance, bind_nak and rejected presentation contexts
//! - Fragment negotiation and multi-fragment calls
//! - Faults for unknown opnums
//! - Call id sequencing
//! - Peers answering with the wrong call id or PDU type

mod common;

use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::thread;

use bytes::Bytes;
use common::{LoopbackServer, ServerOptions};
use rpcmotion::config::{Config, Endpoint};
use rpcmotion::error::{
    BindFailure, BindRejectReason, CallError, ClientError, ConnectError, TransportError,
};
use rpcmotion::network::pdu::{
    read_pdu, write_pdu, Pdu, NCA_S_OP_RNG_ERROR, PFC_FIRST_FRAG, PFC_LAST_FRAG,
    RESULT_ACCEPTANCE,
};
use rpcmotion::network::{
    Connector, InterfaceId, SyntaxId, TcpConnector, Transport, NDR_TRANSFER_SYNTAX,
};
use rpcmotion::protocol::{encode_request, Operation, Request, INTERFACE};
use rpcmotion::{Client, SessionState};

// =============================================================================
// Helper Functions
// =============================================================================

fn other_interface() -> SyntaxId {
    SyntaxId {
        uuid: InterfaceId::new(
            0x0000_0001,
            0x0002,
            0x0003,
            [0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B],
        ),
        version: 1,
        version_minor: 0,
    }
}

fn small_fragments(server_frag: u16) -> (LoopbackServer, Client) {
    let server = LoopbackServer::start_with(ServerOptions {
        max_frag: server_frag,
        ..ServerOptions::default()
    });
    let config = Config::builder()
        .endpoint(server.endpoint())
        .max_frag(512)
        .read_timeout_ms(5000)
        .build();
    let client = Client::new(config);
    client.connect().unwrap();
    (server, client)
}

/// Accepts one connection, acknowledges the bind, then answers the first
/// request with whatever `reply` builds from its call id.
fn misbehaving_peer(reply: fn(u32) -> Pdu) -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let (_, bind) = read_pdu(&mut reader).unwrap();
        let ack = Pdu::BindAck {
            call_id: bind.call_id(),
            max_xmit_frag: 4280,
            max_recv_frag: 4280,
            assoc_group: 0x1234,
            sec_addr: String::new(),
            result: RESULT_ACCEPTANCE,
            reason: 0,
            transfer_syntax: NDR_TRANSFER_SYNTAX,
        };
        write_pdu(&mut writer, &ack).unwrap();
        writer.flush().unwrap();

        let (_, request) = read_pdu(&mut reader).unwrap();
        write_pdu(&mut writer, &reply(request.call_id())).unwrap();
        writer.flush().unwrap();

        // Hold the socket until the client hangs up
        let _ = read_pdu(&mut reader);
    });

    Endpoint::new("127.0.0.1", port)
}

fn peer_client(endpoint: Endpoint) -> Client {
    let config = Config::builder()
        .endpoint(endpoint)
        .read_timeout_ms(5000)
        .build();
    let client = Client::new(config);
    client.connect().unwrap();
    client
}

// =============================================================================
// Bind Tests
// =============================================================================

#[test]
fn test_bind_accepted() {
    let server = LoopbackServer::start();
    let connector = TcpConnector::new(&server.config());

    let mut transport = connector.open(&server.endpoint()).unwrap();
    transport.bind(&INTERFACE).unwrap();
    assert!(transport.peer_addr().starts_with("127.0.0.1:"));
}

#[test]
fn test_bind_negotiates_fragment_size() {
    let server = LoopbackServer::start_with(ServerOptions {
        max_frag: 1024,
        ..ServerOptions::default()
    });
    let connector = TcpConnector::new(&server.config());

    let mut transport = connector.open(&server.endpoint()).unwrap();
    transport.bind(&INTERFACE).unwrap();
    assert_eq!(transport.max_xmit_frag(), 1024);
}

#[test]
fn test_bind_context_rejected() {
    let server = LoopbackServer::start_with(ServerOptions {
        interface: other_interface(),
        ..ServerOptions::default()
    });
    let client = Client::new(server.config());

    let err = client.connect().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Connect(ConnectError::BindRejected {
            reason: BindRejectReason::ContextRejected {
                result: 2,
                reason: 1
            }
        })
    ));
    assert!(!client.is_connected());
}

#[test]
fn test_bind_nak() {
    let server = LoopbackServer::start_with(ServerOptions {
        interface: other_interface(),
        nak_unknown_interface: true,
        ..ServerOptions::default()
    });
    let connector = TcpConnector::new(&server.config());

    let mut transport = connector.open(&server.endpoint()).unwrap();
    let err = transport.bind(&INTERFACE).unwrap_err();
    assert!(matches!(
        err,
        BindFailure::Rejected(BindRejectReason::Nak(0))
    ));
}

// =============================================================================
// Fragmentation Tests
// =============================================================================

#[test]
fn test_fragmented_upload_and_download() {
    let (server, client) = small_fragments(512);
    let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();

    assert_eq!(client.upload_bytes("big.bin", data.clone()).unwrap(), 0);
    assert_eq!(std::fs::read(server.path("big.bin")).unwrap(), data);

    // 10 000 bytes over 488-byte bodies
    let fragments = *server.log.lock().request_fragments.last().unwrap();
    assert!(fragments >= 20, "only {} fragments", fragments);

    match client.download_bytes("big.bin").unwrap() {
        rpcmotion::DownloadData::Data(received) => assert_eq!(received.as_ref(), &data[..]),
        other => panic!("unexpected download result: {:?}", other),
    }
}

#[test]
fn test_server_limit_bounds_fragments() {
    // Client offers 512, server only accepts 256
    let (server, client) = small_fragments(256);

    let long = "x".repeat(2000);
    let reply = client.execute(&format!("echo {}", long)).unwrap();
    assert_eq!(reply.status, 0);
    assert_eq!(reply.output.trim_end(), long);

    // 2000 UTF-16 units over 232-byte bodies
    let fragments = *server.log.lock().request_fragments.last().unwrap();
    assert!(fragments >= 17, "only {} fragments", fragments);
}

#[test]
fn test_fragment_bodies_are_eight_byte_aligned() {
    let server = LoopbackServer::start();
    let config = Config::builder()
        .endpoint(server.endpoint())
        .max_frag(1001)
        .read_timeout_ms(5000)
        .build();
    let client = Client::new(config);
    client.connect().unwrap();

    let data = vec![0x5Au8; 5000];
    assert_eq!(client.upload_bytes("odd.bin", data.clone()).unwrap(), 0);
    assert_eq!(std::fs::read(server.path("odd.bin")).unwrap(), data);

    // 1001 - 24 = 977, rounded down to 976
    let lens = server.log.lock().fragment_lens.clone();
    let (last, rest) = lens.split_last().unwrap();
    assert!(!rest.is_empty(), "upload was not fragmented");
    for len in rest {
        assert_eq!(*len, 976, "fragment lengths: {:?}", lens);
    }
    assert!(*last <= 976);
}

#[test]
fn test_empty_stub_single_fragment() {
    let server = LoopbackServer::start();
    let client = Client::new(server.config());
    client.connect().unwrap();

    client.ping().unwrap();
    assert_eq!(server.log.lock().request_fragments, vec![1]);
}

// =============================================================================
// Call Tests
// =============================================================================

#[test]
fn test_unknown_opnum_faults() {
    let server = LoopbackServer::start();
    let connector = TcpConnector::new(&server.config());
    let mut transport = connector.open(&server.endpoint()).unwrap();
    transport.bind(&INTERFACE).unwrap();

    let err = transport.send_and_receive(7, &[]).unwrap_err();
    assert!(matches!(
        err,
        TransportError::Fault {
            status: NCA_S_OP_RNG_ERROR
        }
    ));
}

#[test]
fn test_raw_call() {
    let server = LoopbackServer::start();
    let connector = TcpConnector::new(&server.config());
    let mut transport = connector.open(&server.endpoint()).unwrap();
    transport.bind(&INTERFACE).unwrap();

    let descriptor = Operation::Execute.descriptor();
    let stub = encode_request(descriptor, &Request::new().field("input", "echo raw")).unwrap();
    let response = transport.send_and_receive(descriptor.opnum, &stub).unwrap();

    let values = rpcmotion::protocol::decode_response(descriptor, response).unwrap();
    assert_eq!(values.get("output").and_then(|v| v.as_str()), Some("raw\r\n"));
    assert_eq!(server.log.lock().opnums, vec![1]);
}

#[test]
fn test_call_ids_increase() {
    let server = LoopbackServer::start();
    let client = Client::new(server.config());
    client.connect().unwrap();

    for _ in 0..3 {
        client.ping().unwrap();
    }

    let ids = server.log.lock().call_ids.clone();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "call ids: {:?}", ids);
}

#[test]
fn test_send_after_close() {
    let server = LoopbackServer::start();
    let connector = TcpConnector::new(&server.config());
    let mut transport = connector.open(&server.endpoint()).unwrap();
    transport.bind(&INTERFACE).unwrap();

    transport.close();
    transport.close();

    let err = transport.send_and_receive(0, &[]).unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[test]
fn test_response_for_wrong_call_id() {
    let endpoint = misbehaving_peer(|call_id| Pdu::Response {
        call_id: call_id + 7,
        flags: PFC_FIRST_FRAG | PFC_LAST_FRAG,
        alloc_hint: 0,
        context_id: 0,
        stub: Bytes::new(),
    });
    let client = peer_client(endpoint);

    let err = client.ping().unwrap_err();
    match err {
        ClientError::Call(CallError::TransportFailure(TransportError::Protocol(msg))) => {
            assert!(msg.contains("call"), "message: {}", msg)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(client.state(), SessionState::Failed);
}

#[test]
fn test_unexpected_pdu_during_call() {
    let endpoint = misbehaving_peer(|call_id| Pdu::BindNak { call_id, reason: 0 });
    let client = peer_client(endpoint);

    let err = client.ping().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Call(CallError::TransportFailure(TransportError::Protocol(_)))
    ));
    assert_eq!(client.state(), SessionState::Failed);
    assert!(!client.is_connected());
}

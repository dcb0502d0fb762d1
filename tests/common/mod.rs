//! Shared test fixtures
//!
//! - [`LoopbackServer`]: an in-process DCE/RPC server implementing the
//!   seven operations against a temporary directory
//! - [`ScriptedConnector`]: an in-memory transport that replays canned
//!   response stubs and records everything sent

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tempfile::TempDir;

use rpcmotion::config::{Config, Endpoint};
use rpcmotion::error::{BindFailure, BindRejectReason, TransportError};
use rpcmotion::ndr::WireValue;
use rpcmotion::network::pdu::{
    read_pdu, write_pdu, Pdu, NCA_S_OP_RNG_ERROR, PFC_FIRST_FRAG, PFC_LAST_FRAG,
    REASON_ABSTRACT_SYNTAX_NOT_SUPPORTED, RESULT_ACCEPTANCE, RESULT_PROVIDER_REJECTION,
};
use rpcmotion::network::{Connector, SyntaxId, Transport, NDR_TRANSFER_SYNTAX};
use rpcmotion::protocol::{decode_request, encode_response, Operation, Request, INTERFACE};

pub const ERROR_FILE_NOT_FOUND: u32 = 2;
pub const ERROR_PATH_NOT_FOUND: u32 = 3;
pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_INVALID_PARAMETER: u32 = 87;

// =============================================================================
// Loopback Server
// =============================================================================

/// Server-side knobs
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Interface the server exports
    pub interface: SyntaxId,

    /// Answer foreign interfaces with bind_nak instead of a rejected bind_ack
    pub nak_unknown_interface: bool,

    /// Largest fragment the server sends and accepts
    pub max_frag: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            interface: INTERFACE,
            nak_unknown_interface: false,
            max_frag: 5840,
        }
    }
}

/// What the server observed, for assertions
#[derive(Debug, Default)]
pub struct ServerLog {
    pub opnums: Vec<u16>,
    pub request_fragments: Vec<usize>,
    /// Stub bytes carried by each request fragment, across all calls
    pub fragment_lens: Vec<usize>,
    pub call_ids: Vec<u32>,
    pub shutdown_requested: bool,
}

pub struct LoopbackServer {
    pub port: u16,
    pub root: TempDir,
    pub log: Arc<Mutex<ServerLog>>,
}

impl LoopbackServer {
    pub fn start() -> Self {
        Self::start_with(ServerOptions::default())
    }

    pub fn start_with(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let root = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(ServerLog::default()));

        let root_path = root.path().to_path_buf();
        let server_log = Arc::clone(&log);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let options = options.clone();
                let root = root_path.clone();
                let log = Arc::clone(&server_log);
                thread::spawn(move || {
                    let _ = serve_connection(stream, &options, &root, &log);
                });
            }
        });

        Self { port, root, log }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port)
    }

    pub fn config(&self) -> Config {
        Config::builder()
            .endpoint(self.endpoint())
            .read_timeout_ms(5000)
            .write_timeout_ms(5000)
            .build()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }
}

fn serve_connection(
    stream: TcpStream,
    options: &ServerOptions,
    root: &Path,
    log: &Mutex<ServerLog>,
) -> Result<(), TransportError> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    let mut stub = BytesMut::new();
    let mut fragments = 0;

    loop {
        let (header, pdu) = read_pdu(&mut reader)?;
        match pdu {
            Pdu::Bind {
                call_id,
                abstract_syntax,
                ..
            } => {
                let reply = if abstract_syntax == options.interface {
                    bind_ack(call_id, options.max_frag, RESULT_ACCEPTANCE, 0)
                } else if options.nak_unknown_interface {
                    Pdu::BindNak { call_id, reason: 0 }
                } else {
                    bind_ack(
                        call_id,
                        options.max_frag,
                        RESULT_PROVIDER_REJECTION,
                        REASON_ABSTRACT_SYNTAX_NOT_SUPPORTED,
                    )
                };
                write_pdu(&mut writer, &reply)?;
                writer.flush()?;
            }
            Pdu::Request {
                call_id,
                opnum,
                stub: fragment,
                ..
            } => {
                stub.extend_from_slice(&fragment);
                fragments += 1;
                log.lock().fragment_lens.push(fragment.len());
                if !header.is_last() {
                    continue;
                }

                let request = stub.split().freeze();
                {
                    let mut log = log.lock();
                    log.opnums.push(opnum);
                    log.request_fragments.push(fragments);
                    log.call_ids.push(call_id);
                }
                fragments = 0;

                match handle(opnum, request, root, log) {
                    Some(response) => {
                        send_response(&mut writer, call_id, &response, options.max_frag)?
                    }
                    None => write_pdu(
                        &mut writer,
                        &Pdu::Fault {
                            call_id,
                            status: NCA_S_OP_RNG_ERROR,
                        },
                    )?,
                }
                writer.flush()?;
            }
            _ => return Ok(()),
        }
    }
}

fn bind_ack(call_id: u32, max_frag: u16, result: u16, reason: u16) -> Pdu {
    Pdu::BindAck {
        call_id,
        max_xmit_frag: max_frag,
        max_recv_frag: max_frag,
        assoc_group: 0x5151,
        sec_addr: "12345".to_string(),
        result,
        reason,
        transfer_syntax: NDR_TRANSFER_SYNTAX,
    }
}

fn send_response<W: Write>(
    writer: &mut W,
    call_id: u32,
    stub: &[u8],
    max_frag: u16,
) -> Result<(), TransportError> {
    let max_body = max_frag as usize - 24;
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
        write_pdu(
            writer,
            &Pdu::Response {
                call_id,
                flags,
                alloc_hint: (stub.len() - offset) as u32,
                context_id: 0,
                stub: Bytes::copy_from_slice(&stub[offset..end]),
            },
        )?;
        offset = end;
        if offset == stub.len() {
            return Ok(());
        }
    }
}

fn string_field(request: &Request, name: &str) -> String {
    request
        .get(name)
        .and_then(WireValue::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Fake command interpreter: whoami, echo, exit N
fn run_command(command: &str) -> (String, u32) {
    let command = command.trim();
    if command == "whoami" {
        return ("loopback\\tester\r\n".to_string(), 0);
    }
    if let Some(text) = command.strip_prefix("echo ") {
        return (format!("{}\r\n", text), 0);
    }
    if let Some(code) = command.strip_prefix("exit ") {
        return (String::new(), code.trim().parse().unwrap_or(1));
    }
    (
        format!("'{}' is not recognized as a command\r\n", command),
        1,
    )
}

fn list_directory(dir: &Path) -> Option<String> {
    let mut entries: Vec<(String, bool)> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (entry.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .collect();
    entries.sort();

    let mut out = String::from("Directory listing:\r\n");
    for (name, is_dir) in entries {
        out.push_str(if is_dir { "[DIR]  " } else { "[FILE] " });
        out.push_str(&name);
        out.push_str("\r\n");
    }
    Some(out)
}

/// Dispatch one call; `None` means the opnum is not exported
fn handle(opnum: u16, stub: Bytes, root: &Path, log: &Mutex<ServerLog>) -> Option<Vec<u8>> {
    let operation = Operation::from_opnum(opnum)?;
    let descriptor = operation.descriptor();
    let request = decode_request(descriptor, stub).ok()?;

    let values = match operation {
        Operation::Ping => vec![WireValue::wstring("PONG_OK"), WireValue::UInt32(0)],
        Operation::Execute => {
            let (output, code) = run_command(&string_field(&request, "input"));
            vec![WireValue::wstring(output), WireValue::UInt32(code)]
        }
        Operation::ExecuteSilent => {
            let (_, code) = run_command(&string_field(&request, "input"));
            vec![WireValue::UInt32(code)]
        }
        Operation::UploadFile => {
            let path = root.join(string_field(&request, "remotePath"));
            let size = request.get("fileSize").and_then(WireValue::as_u32);
            let data = request.get("fileData").and_then(WireValue::as_bytes);
            let code = match (size, data) {
                (Some(size), Some(data)) if size > 0 && !data.is_empty() => {
                    match fs::write(&path, &data[..size.min(data.len() as u32) as usize]) {
                        Ok(()) => 0,
                        Err(_) => ERROR_ACCESS_DENIED,
                    }
                }
                _ => ERROR_INVALID_PARAMETER,
            };
            vec![WireValue::UInt32(code)]
        }
        Operation::DownloadFile => {
            let path = root.join(string_field(&request, "remotePath"));
            match fs::read(&path) {
                Ok(data) => vec![
                    WireValue::UInt32(data.len() as u32),
                    WireValue::bytes(data),
                    WireValue::UInt32(0),
                ],
                Err(_) => vec![
                    WireValue::UInt32(0),
                    WireValue::Bytes(None),
                    WireValue::UInt32(ERROR_FILE_NOT_FOUND),
                ],
            }
        }
        Operation::ListDirectory => {
            let path = string_field(&request, "path");
            let dir = if path.is_empty() {
                root.to_path_buf()
            } else {
                root.join(path)
            };
            match list_directory(&dir) {
                Some(listing) => vec![WireValue::wstring(listing), WireValue::UInt32(0)],
                None => vec![WireValue::WString(None), WireValue::UInt32(ERROR_PATH_NOT_FOUND)],
            }
        }
        Operation::Shutdown => {
            log.lock().shutdown_requested = true;
            Vec::new()
        }
    };

    encode_response(descriptor, &values).ok().map(|b| b.to_vec())
}

// =============================================================================
// Scripted Transport
// =============================================================================

/// A request as it reached the transport
#[derive(Debug)]
pub struct Sent {
    pub opnum: u16,
    pub stub: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Script {
    /// Response stubs (or failures) handed out in order
    pub responses: VecDeque<Result<Bytes, TransportError>>,

    /// Every request that reached the transport
    pub sent: Vec<Sent>,

    /// Refuse every open with ConnectionRefused
    pub refuse_open: bool,

    /// Reject every bind with this reason
    pub reject_bind: Option<BindRejectReason>,

    pub opens: usize,
    pub closes: usize,

    /// Time each call spends "on the wire"
    pub latency: Option<Duration>,

    /// Enter/exit markers, to prove calls never overlap
    pub events: Vec<(&'static str, u16)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response built from values in declared order
    pub fn respond(&self, operation: Operation, values: &[WireValue]) {
        let stub = encode_response(operation.descriptor(), values).unwrap();
        self.script.lock().responses.push_back(Ok(stub));
    }

    pub fn respond_raw(&self, stub: impl Into<Bytes>) {
        self.script.lock().responses.push_back(Ok(stub.into()));
    }

    pub fn fail_next(&self, error: TransportError) {
        self.script.lock().responses.push_back(Err(error));
    }

    pub fn sent_count(&self) -> usize {
        self.script.lock().sent.len()
    }

    pub fn opnums(&self) -> Vec<u16> {
        self.script.lock().sent.iter().map(|s| s.opnum).collect()
    }
}

pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    closed: bool,
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn open(&self, _endpoint: &Endpoint) -> Result<ScriptedTransport, TransportError> {
        let mut script = self.script.lock();
        if script.refuse_open {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        script.opens += 1;
        Ok(ScriptedTransport {
            script: Arc::clone(&self.script),
            closed: false,
        })
    }
}

impl Transport for ScriptedTransport {
    fn bind(&mut self, _interface: &SyntaxId) -> Result<(), BindFailure> {
        match self.script.lock().reject_bind {
            Some(reason) => Err(BindFailure::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn send_and_receive(&mut self, opnum: u16, stub: &[u8]) -> Result<Bytes, TransportError> {
        let latency = {
            let mut script = self.script.lock();
            script.events.push(("enter", opnum));
            script.sent.push(Sent {
                opnum,
                stub: stub.to_vec(),
            });
            script.latency
        };

        // Sleep without the script lock so a racing call could slip in
        if let Some(latency) = latency {
            thread::sleep(latency);
        }

        let mut script = self.script.lock();
        script.events.push(("exit", opnum));
        script
            .responses
            .pop_front()
            .unwrap_or(Err(TransportError::Closed))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.script.lock().closes += 1;
        }
    }
}

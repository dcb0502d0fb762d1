//! Convenience client
//!
//! Fixed field bindings over [`Session::call`], one method per operation.
//! Remote failures come back as the status code in the reply, not as an
//! error; only local and protocol problems are `Err`.

use std::fs;
use std::path::Path;

use bytes::Bytes;

use crate::config::{Config, Endpoint};
use crate::error::{CallError, ClientError, Result};
use crate::ndr::WireValue;
use crate::network::{Connector, TcpConnector};
use crate::protocol::{Operation, Request, ResponseValues, PING_BANNER};
use crate::session::{Session, SessionState};

/// Reply to Ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    pub status: u32,
    pub response: Option<String>,
}

/// Reply to Execute and ListDirectory; a null output is an empty string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    pub status: u32,
    pub output: String,
}

impl TextReply {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Result of downloading into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadData {
    Data(Bytes),
    RemoteError(u32),
}

/// Result of downloading to a local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { bytes: u64 },
    RemoteError(u32),
}

/// Client for the RPCMotion interface
pub struct Client<C: Connector = TcpConnector> {
    config: Config,
    session: Session<C>,
}

impl Client<TcpConnector> {
    /// TCP client; nothing is opened until `connect`
    pub fn new(config: Config) -> Self {
        let connector = TcpConnector::new(&config);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> Client<C> {
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self {
            config,
            session: Session::new(connector),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect to the configured endpoint
    pub fn connect(&self) -> Result<()> {
        let endpoint = self.config.endpoint.clone();
        self.connect_to(&endpoint)
    }

    /// Connect to `endpoint`, verifying liveness if configured
    pub fn connect_to(&self, endpoint: &Endpoint) -> Result<()> {
        self.session.connect(endpoint)?;

        if self.config.verify_on_connect {
            if let Err(e) = self.verify() {
                self.session.disconnect();
                return Err(e);
            }
        }
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        let reply = self.ping()?;
        if reply.status != 0 || reply.response.as_deref() != Some(PING_BANNER) {
            return Err(ClientError::UnexpectedPing {
                status: reply.status,
                response: reply.response,
            });
        }
        tracing::debug!("Server answered {}", PING_BANNER);
        Ok(())
    }

    /// Drop the connection and connect again to the same endpoint
    pub fn reconnect(&self) -> Result<()> {
        let endpoint = self
            .session
            .endpoint()
            .unwrap_or_else(|| self.config.endpoint.clone());
        self.session.disconnect();
        self.connect_to(&endpoint)
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Endpoint of the current or last failed connection
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.session.endpoint()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn ping(&self) -> Result<PingReply> {
        let mut values = self.session.invoke(Operation::Ping, &Request::new())?;
        Ok(PingReply {
            status: status(&values)?,
            response: take_string(&mut values, "response"),
        })
    }

    pub fn execute(&self, command: &str) -> Result<TextReply> {
        let request = Request::new().field("input", command);
        let mut values = self.session.invoke(Operation::Execute, &request)?;
        Ok(TextReply {
            status: status(&values)?,
            output: take_string(&mut values, "output").unwrap_or_default(),
        })
    }

    /// Run a command without capturing output; returns its exit status
    pub fn execute_silent(&self, command: &str) -> Result<u32> {
        let request = Request::new().field("input", command);
        let values = self.session.invoke(Operation::ExecuteSilent, &request)?;
        status(&values)
    }

    /// Upload a local file in a single call
    ///
    /// Files over `u32::MAX` bytes are rejected before anything is sent.
    pub fn upload_file(&self, local: impl AsRef<Path>, remote: &str) -> Result<u32> {
        let local = local.as_ref();
        let size = fs::metadata(local)
            .map_err(|e| ClientError::io(local, e))?
            .len();
        if size > u32::MAX as u64 {
            return Err(ClientError::FileTooLarge {
                path: local.to_path_buf(),
                size,
            });
        }

        let data = fs::read(local).map_err(|e| ClientError::io(local, e))?;
        tracing::debug!("Uploading {} ({} bytes) to {}", local.display(), data.len(), remote);
        self.upload_bytes(remote, data)
    }

    /// Upload an in-memory buffer to `remote`
    pub fn upload_bytes(&self, remote: &str, data: impl Into<Bytes>) -> Result<u32> {
        let data = data.into();
        let size = u32::try_from(data.len()).map_err(|_| ClientError::FileTooLarge {
            path: remote.into(),
            size: data.len() as u64,
        })?;

        let request = Request::new()
            .field("remotePath", remote)
            .field("fileSize", size)
            .field("fileData", data);
        let values = self.session.invoke(Operation::UploadFile, &request)?;
        status(&values)
    }

    /// Download `remote` into memory
    ///
    /// Success with a null buffer is `MissingFileData`; success with a
    /// present empty buffer is an empty file.
    pub fn download_bytes(&self, remote: &str) -> Result<DownloadData> {
        let request = Request::new().field("remotePath", remote);
        let mut values = self.session.invoke(Operation::DownloadFile, &request)?;

        let code = status(&values)?;
        if code != 0 {
            return Ok(DownloadData::RemoteError(code));
        }

        let declared = values
            .get("fileSize")
            .and_then(WireValue::as_u32)
            .ok_or_else(|| missing_field("fileSize"))?;
        let data = match values.take("fileData") {
            Some(WireValue::Bytes(Some(data))) => data,
            Some(WireValue::Bytes(None)) => {
                tracing::warn!("Server reported success for {} without file data", remote);
                return Err(ClientError::MissingFileData);
            }
            _ => return Err(missing_field("fileData").into()),
        };

        if data.len() != declared as usize {
            return Err(ClientError::SizeMismatch {
                declared,
                received: data.len(),
            });
        }
        Ok(DownloadData::Data(data))
    }

    /// Download `remote` and write it to `local`
    pub fn download_file(&self, remote: &str, local: impl AsRef<Path>) -> Result<DownloadOutcome> {
        let local = local.as_ref();
        match self.download_bytes(remote)? {
            DownloadData::Data(data) => {
                fs::write(local, &data).map_err(|e| ClientError::io(local, e))?;
                tracing::debug!("Saved {} bytes to {}", data.len(), local.display());
                Ok(DownloadOutcome::Saved {
                    bytes: data.len() as u64,
                })
            }
            DownloadData::RemoteError(code) => Ok(DownloadOutcome::RemoteError(code)),
        }
    }

    /// List `path` on the server; empty means its working directory
    pub fn list_directory(&self, path: &str) -> Result<TextReply> {
        let request = Request::new().field("path", path);
        let mut values = self.session.invoke(Operation::ListDirectory, &request)?;
        Ok(TextReply {
            status: status(&values)?,
            output: take_string(&mut values, "output").unwrap_or_default(),
        })
    }

    /// Ask the server to stop listening, then drop the connection
    pub fn shutdown(&self) -> Result<()> {
        self.session.invoke(Operation::Shutdown, &Request::new())?;
        self.session.disconnect();
        Ok(())
    }
}

fn missing_field(name: &str) -> CallError {
    CallError::MalformedResponse(format!("response lacks field '{}'", name))
}

fn status(values: &ResponseValues) -> Result<u32> {
    values
        .return_code()
        .ok_or_else(|| missing_field(crate::protocol::RETURN_FIELD).into())
}

fn take_string(values: &mut ResponseValues, name: &str) -> Option<String> {
    match values.take(name) {
        Some(WireValue::WString(s)) => s,
        _ => None,
    }
}

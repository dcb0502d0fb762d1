//! Configuration for rpcmotion
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::time::Duration;

/// Default server port the RPCMotion service listens on.
pub const DEFAULT_PORT: u16 = 12345;

/// Default fragment size offered during bind.
pub const DEFAULT_MAX_FRAG: u16 = 4280;

/// Remote server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ncacn_ip_tcp string binding form
        write!(f, "ncacn_ip_tcp:{}[{}]", self.host, self.port)
    }
}

/// Main configuration for a client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint
    // -------------------------------------------------------------------------
    /// Server to connect to
    pub endpoint: Endpoint,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read timeout while waiting for a response (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // DCE/RPC Configuration
    // -------------------------------------------------------------------------
    /// Largest fragment we offer to send
    pub max_xmit_frag: u16,

    /// Largest fragment we offer to receive
    pub max_recv_frag: u16,

    /// Ping the server after binding and require the PONG_OK banner
    pub verify_on_connect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            verify_on_connect: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server endpoint
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.endpoint.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.endpoint.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set both fragment sizes offered during bind
    pub fn max_frag(mut self, size: u16) -> Self {
        self.config.max_xmit_frag = size;
        self.config.max_recv_frag = size;
        self
    }

    /// Require a successful ping right after binding
    pub fn verify_on_connect(mut self, verify: bool) -> Self {
        self.config.verify_on_connect = verify;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

//! # rpcmotion
//!
//! Client for the RPCMotion remote command and file-transfer interface:
//! - DCE/RPC connection-oriented transport over TCP, no authentication
//! - NDR stub marshaling driven by a static operation catalog
//! - One call at a time per session, response correlated by call id
//! - Typed errors for connect, call and transport failures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Client / CLI shell                        │
//! │         (ping, execute, upload, download, list, ...)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Session                                │
//! │            (connect / call / disconnect, Mutex)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Protocol   │          │   Network   │
//!   │  (catalog)  │          │ (DCE/RPC)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │     NDR     │
//!   │ (wire codec)│
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod ndr;
pub mod protocol;
pub mod network;
pub mod session;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CallError, ClientError, ConnectError, Result, TransportError};
pub use config::{Config, Endpoint};
pub use client::{Client, DownloadData, DownloadOutcome, PingReply, TextReply};
pub use protocol::{Operation, Request, ResponseValues};
pub use session::{Session, SessionState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rpcmotion
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

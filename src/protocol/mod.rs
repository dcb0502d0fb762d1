//! Protocol Module
//!
//! The operation catalog of the RPCMotion interface and the stub codec
//! that marshals calls against it.
//!
//! ## Interface
//! `12345778-1234-ABCD-EF00-0123456789AC` version 1.0
//!
//! ## Operations
//! | Opnum | Operation     | Request                               | Response                              |
//! |-------|---------------|---------------------------------------|---------------------------------------|
//! | 0     | Ping          | -                                     | response: WString?, Return            |
//! | 1     | Execute       | input: WString                        | output: WString?, Return              |
//! | 2     | ExecuteSilent | input: WString                        | Return                                |
//! | 3     | UploadFile    | remotePath, fileSize: u32, fileData   | Return                                |
//! | 4     | DownloadFile  | remotePath: WString                   | fileSize: u32, fileData: Bytes?, Return |
//! | 5     | ListDirectory | path: WString                         | output: WString?, Return              |
//! | 6     | Shutdown      | -                                     | -                                     |
//!
//! `Return` is the remote status: 0 on success, a Win32 error code otherwise.

mod catalog;
mod codec;
mod message;
mod operation;

pub use catalog::{OperationDescriptor, CATALOG, RETURN_FIELD};
pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use message::{Request, ResponseValues};
pub use operation::{Field, Operation};

use crate::network::{InterfaceId, SyntaxId};

/// Interface identifier bound on every connection
pub const INTERFACE: SyntaxId = SyntaxId {
    uuid: InterfaceId::new(
        0x1234_5778,
        0x1234,
        0xABCD,
        [0xEF, 0x00, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAC],
    ),
    version: 1,
    version_minor: 0,
};

/// Banner a healthy server returns from Ping
pub const PING_BANNER: &str = "PONG_OK";

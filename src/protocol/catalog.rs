//! Operation catalog
//!
//! Static request/response shapes, indexed by opnum. New operations are
//! appended; existing opnums never move.

use super::{Field, Operation};
use crate::ndr::WireType::{Bytes, NullableBytes, NullableWString, UInt32, WString};

/// Name of the trailing status field every non-void operation returns
pub const RETURN_FIELD: &str = "Return";

/// Shape of one remote operation
#[derive(Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub opnum: u16,
    pub name: &'static str,
    pub request_fields: &'static [Field],
    pub response_fields: &'static [Field],
}

impl OperationDescriptor {
    /// Whether the response ends with a `Return` status code
    pub fn has_return(&self) -> bool {
        self.response_fields
            .last()
            .is_some_and(|field| field.name == RETURN_FIELD)
    }
}

const RETURN: Field = Field::new(RETURN_FIELD, UInt32);

/// All operations, position = opnum
pub static CATALOG: [OperationDescriptor; 7] = [
    OperationDescriptor {
        operation: Operation::Ping,
        opnum: 0,
        name: "Ping",
        request_fields: &[],
        response_fields: &[Field::new("response", NullableWString), RETURN],
    },
    OperationDescriptor {
        operation: Operation::Execute,
        opnum: 1,
        name: "Execute",
        request_fields: &[Field::new("input", WString)],
        response_fields: &[Field::new("output", NullableWString), RETURN],
    },
    OperationDescriptor {
        operation: Operation::ExecuteSilent,
        opnum: 2,
        name: "ExecuteSilent",
        request_fields: &[Field::new("input", WString)],
        response_fields: &[RETURN],
    },
    OperationDescriptor {
        operation: Operation::UploadFile,
        opnum: 3,
        name: "UploadFile",
        request_fields: &[
            Field::new("remotePath", WString),
            Field::new("fileSize", UInt32),
            Field::new("fileData", Bytes),
        ],
        response_fields: &[RETURN],
    },
    OperationDescriptor {
        operation: Operation::DownloadFile,
        opnum: 4,
        name: "DownloadFile",
        request_fields: &[Field::new("remotePath", WString)],
        response_fields: &[
            Field::new("fileSize", UInt32),
            Field::new("fileData", NullableBytes),
            RETURN,
        ],
    },
    OperationDescriptor {
        operation: Operation::ListDirectory,
        opnum: 5,
        name: "ListDirectory",
        request_fields: &[Field::new("path", WString)],
        response_fields: &[Field::new("output", NullableWString), RETURN],
    },
    OperationDescriptor {
        operation: Operation::Shutdown,
        opnum: 6,
        name: "Shutdown",
        request_fields: &[],
        response_fields: &[],
    },
];

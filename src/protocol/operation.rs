//! Operation definitions
//!
//! Identifies the remote procedures of the interface.

use std::fmt;

use super::catalog::CATALOG;
use super::OperationDescriptor;
use crate::ndr::WireType;

/// Remote operations, discriminant = opnum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Operation {
    Ping = 0,
    Execute = 1,
    ExecuteSilent = 2,
    UploadFile = 3,
    DownloadFile = 4,
    ListDirectory = 5,
    Shutdown = 6,
}

impl Operation {
    /// Every operation, in opnum order
    pub const ALL: [Operation; 7] = [
        Operation::Ping,
        Operation::Execute,
        Operation::ExecuteSilent,
        Operation::UploadFile,
        Operation::DownloadFile,
        Operation::ListDirectory,
        Operation::Shutdown,
    ];

    pub fn opnum(self) -> u16 {
        self as u16
    }

    pub fn from_opnum(opnum: u16) -> Option<Self> {
        Self::ALL.get(opnum as usize).copied()
    }

    /// Catalog entry for this operation
    pub fn descriptor(self) -> &'static OperationDescriptor {
        &CATALOG[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named, typed stub field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: WireType,
}

impl Field {
    pub const fn new(name: &'static str, ty: WireType) -> Self {
        Self { name, ty }
    }
}

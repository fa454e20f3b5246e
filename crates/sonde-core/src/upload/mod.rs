//! Delivery of the measurement file to the remote collector

mod tftp;

pub use tftp::{BLOCK_SIZE, TftpClient};

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::config::Endpoint;
use crate::storage::MeasurementFile;

/// Result of a completed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub bytes_sent: usize,
    /// Data blocks sent, including a final empty block if one was needed
    pub blocks: u32,
    /// Whether the server acknowledged the last block
    pub acknowledged: bool,
}

/// Why the server refused or broke off the transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("server error {code}: {message}")]
    ServerError { code: u16, message: String },
    #[error("unexpected packet with opcode {opcode}")]
    UnexpectedPacket { opcode: u16 },
    #[error("acknowledgement for block {got} while waiting for block {expected}")]
    OutOfOrder { expected: u16, got: u16 },
    #[error("malformed {len}-byte reply")]
    Malformed { len: usize },
    #[error("file name {name:?} does not fit in a request packet")]
    InvalidFilename { name: String },
}

#[derive(Error, Debug)]
pub enum TransferError {
    /// The server could not be addressed or never answered the request
    #[error("server {server} unreachable: {source}")]
    Unreachable {
        server: String,
        #[source]
        source: io::Error,
    },
    /// The server went quiet part way through the transfer
    #[error("no reply from {server} for block {block} within {timeout:?}")]
    Timeout {
        server: String,
        block: u16,
        timeout: Duration,
    },
    #[error("transfer to {server} rejected: {reason}")]
    Rejected { server: String, reason: RejectReason },
}

/// Sends a measurement file to a server in one attempt.
///
/// Implementations never retry internally and never touch local storage.
pub trait Uploader {
    fn upload(
        &mut self,
        file: &MeasurementFile,
        server: &Endpoint,
    ) -> Result<UploadOutcome, TransferError>;
}

impl<U: Uploader + ?Sized> Uploader for &mut U {
    fn upload(
        &mut self,
        file: &MeasurementFile,
        server: &Endpoint,
    ) -> Result<UploadOutcome, TransferError> {
        (**self).upload(file, server)
    }
}

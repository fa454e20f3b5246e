//! TFTP write client (RFC 1350, octet mode)
//!
//! ```text
//!   client                          server
//!     │── WRQ name "octet" ──────────▶│ :69
//!     │◀──────────────── ACK 0 ───────│ :tid
//!     │── DATA 1 (512 bytes) ────────▶│ :tid
//!     │◀──────────────── ACK 1 ───────│
//!     │   ...                         │
//!     │── DATA n (< 512 bytes) ──────▶│
//!     │◀──────────────── ACK n ───────│
//! ```
//!
//! The server answers from a fresh port (its transfer id); every later packet
//! goes there, and packets from any other address are ignored.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::{RejectReason, TransferError, UploadOutcome, Uploader};
use crate::config::{Endpoint, TransferConfig};
use crate::storage::MeasurementFile;

/// Payload bytes per DATA packet
pub const BLOCK_SIZE: usize = 512;

const HEADER_SIZE: usize = 4;
const MAX_PACKET: usize = HEADER_SIZE + BLOCK_SIZE;

const OP_WRQ: u16 = 2;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;

const MODE: &[u8] = b"octet";

type Packet = heapless::Vec<u8, MAX_PACKET>;

/// Build a write request. Fails when the name cannot be carried in one packet.
fn write_request(name: &str) -> Result<Packet, RejectReason> {
    let invalid = || RejectReason::InvalidFilename {
        name: name.to_owned(),
    };
    if name.is_empty() || name.bytes().any(|b| b == 0) {
        return Err(invalid());
    }

    let opcode = OP_WRQ.to_be_bytes();
    let mut packet = Packet::new();
    for part in [&opcode[..], name.as_bytes(), &[0u8][..], MODE, &[0u8][..]] {
        packet.extend_from_slice(part).map_err(|_| invalid())?;
    }
    Ok(packet)
}

enum Reply {
    Ack(u16),
    Error { code: u16, message: String },
}

fn parse_reply(packet: &[u8]) -> Result<Reply, RejectReason> {
    if packet.len() < HEADER_SIZE {
        return Err(RejectReason::Malformed { len: packet.len() });
    }
    let opcode = u16::from_be_bytes([packet[0], packet[1]]);
    let arg = u16::from_be_bytes([packet[2], packet[3]]);

    match opcode {
        OP_ACK => Ok(Reply::Ack(arg)),
        OP_ERROR => {
            let message = packet[HEADER_SIZE..]
                .split(|&b| b == 0)
                .next()
                .unwrap_or_default();
            Ok(Reply::Error {
                code: arg,
                message: String::from_utf8_lossy(message).into_owned(),
            })
        }
        _ => Err(RejectReason::UnexpectedPacket { opcode }),
    }
}

fn resolve(server: &Endpoint) -> io::Result<SocketAddr> {
    if server.port == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "port 0 is not a valid destination",
        ));
    }
    (server.host.as_str(), server.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host resolved to no address"))
}

/// One transfer in progress
struct Session {
    socket: UdpSocket,
    server: SocketAddr,
    /// Server transfer port, known once the request is acknowledged
    peer: Option<SocketAddr>,
    label: String,
    timeout: Duration,
}

impl Session {
    fn open(server: &Endpoint, timeout: Duration) -> Result<Self, TransferError> {
        let label = server.to_string();
        let unreachable = |source: io::Error| TransferError::Unreachable {
            server: label.clone(),
            source,
        };

        let address = resolve(server).map_err(unreachable)?;
        let local: SocketAddr = if address.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(unreachable)?;

        Ok(Self {
            socket,
            server: address,
            peer: None,
            label,
            timeout,
        })
    }

    fn unreachable(&self, source: io::Error) -> TransferError {
        TransferError::Unreachable {
            server: self.label.clone(),
            source,
        }
    }

    fn rejected(&self, reason: RejectReason) -> TransferError {
        TransferError::Rejected {
            server: self.label.clone(),
            reason,
        }
    }

    fn send(&self, packet: &[u8]) -> Result<(), TransferError> {
        let target = self.peer.unwrap_or(self.server);
        self.socket
            .send_to(packet, target)
            .map_err(|e| self.unreachable(e))?;
        Ok(())
    }

    fn send_data(&self, block: u16, chunk: &[u8]) -> Result<(), TransferError> {
        let mut packet = [0u8; MAX_PACKET];
        packet[..2].copy_from_slice(&OP_DATA.to_be_bytes());
        packet[2..HEADER_SIZE].copy_from_slice(&block.to_be_bytes());
        packet[HEADER_SIZE..HEADER_SIZE + chunk.len()].copy_from_slice(chunk);
        self.send(&packet[..HEADER_SIZE + chunk.len()])
    }

    fn accepts(&self, from: SocketAddr) -> bool {
        match self.peer {
            Some(peer) => from == peer,
            None => from.ip() == self.server.ip(),
        }
    }

    /// Wait for the acknowledgement of `block`, skipping duplicates of the
    /// previous one and anything from a foreign address.
    fn await_ack(&mut self, block: u16) -> Result<(), TransferError> {
        let deadline = Instant::now() + self.timeout;
        let timed_out = TransferError::Timeout {
            server: self.label.clone(),
            block,
            timeout: self.timeout,
        };
        let mut buf = [0u8; MAX_PACKET];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out);
            }
            self.socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| self.unreachable(e))?;

            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(timed_out);
                }
                Err(e) => return Err(self.unreachable(e)),
            };

            if !self.accepts(from) {
                trace!("(tftp) Ignoring {} bytes from {}", len, from);
                continue;
            }

            match parse_reply(&buf[..len]).map_err(|reason| self.rejected(reason))? {
                Reply::Ack(acked) if acked == block => {
                    if self.peer.is_none() {
                        self.peer = Some(from);
                    }
                    return Ok(());
                }
                Reply::Ack(acked) if acked == block.wrapping_sub(1) => {
                    trace!("(tftp) Duplicate ACK {}", acked);
                }
                Reply::Ack(acked) => {
                    return Err(self.rejected(RejectReason::OutOfOrder {
                        expected: block,
                        got: acked,
                    }));
                }
                Reply::Error { code, message } => {
                    return Err(self.rejected(RejectReason::ServerError { code, message }));
                }
            }
        }
    }
}

/// Blocking TFTP uploader.
///
/// Each block is sent once. No reply to the write request ends the transfer
/// with [`TransferError::Unreachable`]; a missing acknowledgement for a data
/// block ends it with [`TransferError::Timeout`].
#[derive(Debug, Clone)]
pub struct TftpClient {
    timeout: Duration,
    block_pause: Duration,
}

impl TftpClient {
    pub fn new(timeout: Duration, block_pause: Duration) -> Self {
        Self {
            // A zero read timeout means "block forever" to the socket
            timeout: timeout.max(Duration::from_millis(1)),
            block_pause,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.timeout, config.block_pause)
    }
}

impl Default for TftpClient {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl Uploader for TftpClient {
    fn upload(
        &mut self,
        file: &MeasurementFile,
        server: &Endpoint,
    ) -> Result<UploadOutcome, TransferError> {
        let request = write_request(&file.name).map_err(|reason| TransferError::Rejected {
            server: server.to_string(),
            reason,
        })?;

        let mut session = Session::open(server, self.timeout)?;
        session.send(&request)?;
        // The socket is unconnected, so a refused or dead host only shows up
        // as silence
        session.await_ack(0).map_err(|e| match e {
            TransferError::Timeout {
                server, timeout, ..
            } => TransferError::Unreachable {
                server,
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no reply to write request within {timeout:?}"),
                ),
            },
            other => other,
        })?;
        debug!(
            "(tftp) Write request for {} accepted, transfer port {:?}",
            file.name, session.peer
        );

        let mut outcome = UploadOutcome {
            bytes_sent: 0,
            blocks: 0,
            acknowledged: false,
        };
        let mut block: u16 = 0;
        let mut offset = 0;
        loop {
            let end = (offset + BLOCK_SIZE).min(file.len());
            let chunk = &file.contents[offset..end];
            block = block.wrapping_add(1);

            session.send_data(block, chunk)?;
            session.await_ack(block)?;
            outcome.bytes_sent += chunk.len();
            outcome.blocks += 1;
            trace!("(tftp) Block {} acknowledged ({} bytes)", block, chunk.len());

            // A short (possibly empty) block ends the transfer
            if chunk.len() < BLOCK_SIZE {
                break;
            }
            offset = end;
            if !self.block_pause.is_zero() {
                std::thread::sleep(self.block_pause);
            }
        }

        outcome.acknowledged = true;
        Ok(outcome)
    }
}

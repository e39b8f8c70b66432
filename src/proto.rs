//! Wire protocol records and command enumeration.
//!
//! Fixed-size binary records over a same-host Unix-domain stream: no length
//! prefix and no byte-order conversion, since both ends are the same build
//! on the same machine, so fields travel native-endian. A request is 8 bytes,
//! a response 16; the sizes below are the authoritative record sizes for
//! all send/receive accumulation.

/// Commands a client may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    /// Capture a frame from every camera and respond; the response payload
    /// currently carries the service loop's iteration counter.
    GetMap = 0x01,
    /// Liveness probe; echoed back with zero data.
    Ping = 0x02,
    /// Ask the service loop to exit.
    Exit = 0x03,
}

impl Command {
    /// Decodes a raw command word. Unknown values yield `None`; the
    /// dispatcher logs and ignores them.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x01 => Some(Self::GetMap),
            0x02 => Some(Self::Ping),
            0x03 => Some(Self::Exit),
            _ => None,
        }
    }

    /// Raw wire value.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Client-to-server request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Caller-chosen transaction id, echoed in the response.
    pub trx_id: u32,
    /// Raw command word; see [`Command`].
    pub cmd: u32,
}

impl Request {
    /// Exact wire size in bytes.
    pub const SIZE: usize = 8;

    /// Builds a request for a known command.
    pub const fn new(trx_id: u32, cmd: Command) -> Self {
        Self {
            trx_id,
            cmd: cmd.raw(),
        }
    }

    /// The command, when the raw word is a known one.
    pub const fn command(&self) -> Option<Command> {
        Command::from_raw(self.cmd)
    }

    /// Encodes into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        buf[..4].copy_from_slice(&self.trx_id.to_ne_bytes());
        buf[4..].copy_from_slice(&self.cmd.to_ne_bytes());
        buf
    }

    /// Decodes from the fixed wire layout.
    pub fn from_bytes(buf: [u8; Self::SIZE]) -> Self {
        Self {
            trx_id: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            cmd: u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

/// Server-to-client response record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Transaction id copied from the request.
    pub trx_id: u32,
    /// Command word copied from the request.
    pub cmd: u32,
    /// Command-specific payload.
    pub data: u64,
}

impl Response {
    /// Exact wire size in bytes.
    pub const SIZE: usize = 16;

    /// Builds the response echoing a request's id and command.
    pub const fn reply(request: &Request, data: u64) -> Self {
        Self {
            trx_id: request.trx_id,
            cmd: request.cmd,
            data,
        }
    }

    /// Encodes into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        buf[..4].copy_from_slice(&self.trx_id.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.cmd.to_ne_bytes());
        buf[8..].copy_from_slice(&self.data.to_ne_bytes());
        buf
    }

    /// Decodes from the fixed wire layout.
    pub fn from_bytes(buf: [u8; Self::SIZE]) -> Self {
        Self {
            trx_id: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            cmd: u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
            data: u64::from_ne_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        }
    }
}

//! Wire Protocol Types
//!
//! driftkv speaks a length-prefixed binary protocol. All integers are
//! little-endian unsigned 32-bit values.
//!
//! Request frame:
//!
//! ```text
//! ┌──────────┬───────┬─────────┬──────────┬─────────┬──────────┬───┐
//! │ total_len│ nargs │ arg_len │ arg bytes│ arg_len │ arg bytes│...│
//! │   u32    │  u32  │   u32   │          │   u32   │          │   │
//! └──────────┴───────┴─────────┴──────────┴─────────┴──────────┴───┘
//!             └────────────── total_len bytes ─────────────────────┘
//! ```
//!
//! Response frame:
//!
//! ```text
//! ┌──────────┬────────┬─────────────┐
//! │ total_len│ status │   payload   │    total_len = 4 + payload len
//! │   u32    │  u32   │             │    status: 0=OK 1=ERR 2=NX
//! └──────────┴────────┴─────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Largest frame body the server accepts: 32 MiB. A frame announcing more
/// closes the connection without a reply.
pub const MAX_FRAME_SIZE: usize = 32 << 20;

/// Largest number of arguments a single request may carry.
pub const MAX_ARGS: usize = 200_000;

/// Size of the `total_len` prefix preceding every frame.
pub const HEADER_SIZE: usize = 4;

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// The operation succeeded.
    Ok = 0,
    /// Malformed or unknown command, or an operation that cannot apply.
    Err = 1,
    /// The key does not exist (or has expired).
    Nx = 2,
}

impl Status {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(raw: u32) -> Option<Status> {
        match raw {
            0 => Some(Status::Ok),
            1 => Some(Status::Err),
            2 => Some(Status::Nx),
            _ => None,
        }
    }
}

/// A parsed request: the argument vector of one frame. The first argument
/// is the command name; comparisons are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub args: Vec<Bytes>,
}

impl Request {
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Encodes the request as a wire frame. The server never sends
    /// requests; this is the client half of the framing, used by tests.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let body_len: usize = 4 + self.args.iter().map(|arg| 4 + arg.len()).sum::<usize>();
        buf.reserve(HEADER_SIZE + body_len);
        buf.put_u32_le(body_len as u32);
        buf.put_u32_le(self.args.len() as u32);
        for arg in &self.args {
            buf.put_u32_le(arg.len() as u32);
            buf.put_slice(arg);
        }
    }
}

/// A response: status plus an optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Bytes,
}

impl Response {
    /// `OK` with no payload.
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            payload: Bytes::new(),
        }
    }

    /// `OK` carrying a payload.
    pub fn ok_with(payload: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    /// `ERR`; never carries a payload.
    pub fn err() -> Self {
        Self {
            status: Status::Err,
            payload: Bytes::new(),
        }
    }

    /// `NX` (key not found); never carries a payload.
    pub fn nx() -> Self {
        Self {
            status: Status::Nx,
            payload: Bytes::new(),
        }
    }

    /// Appends the wire encoding of this response to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE + 4 + self.payload.len());
        buf.put_u32_le((4 + self.payload.len()) as u32);
        buf.put_u32_le(self.status.as_u32());
        buf.put_slice(&self.payload);
    }
}

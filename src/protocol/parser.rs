//! Incremental Frame Parser
//!
//! TCP is a stream, so a read may deliver half a frame or several frames at
//! once. The parser works against whatever the connection has buffered and
//! returns one of three results:
//!
//! - `Ok(Some((request, consumed)))` — a complete frame was parsed;
//!   `consumed` bytes of the buffer belong to it
//! - `Ok(None)` — the buffered data is an incomplete frame; read more
//! - `Err(FrameError)` — the frame violates the protocol; the connection
//!   must be closed without a reply
//!
//! The caller loop is: read into the buffer, parse until `Ok(None)`,
//! advancing the buffer by `consumed` after each frame.
//!
//! Size limits are enforced before any allocation depends on them: a frame
//! announcing more than [`MAX_FRAME_SIZE`] bytes or more than [`MAX_ARGS`]
//! arguments is rejected from its header alone.

use crate::protocol::types::{Request, HEADER_SIZE, MAX_ARGS, MAX_FRAME_SIZE};
use bytes::{Buf, Bytes};
use thiserror::Error;

/// Protocol violations. Any of these closes the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame announces a body larger than the per-message limit.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame announces more arguments than the per-request limit.
    #[error("request declares {count} arguments (max: {max})")]
    TooManyArgs { count: usize, max: usize },

    /// An argument header or its data runs past the end of the frame.
    #[error("argument data runs past the end of the frame")]
    ArgOverrun,

    /// The argument vector ended before the announced frame length.
    #[error("frame carries {0} trailing bytes after the last argument")]
    TrailingBytes(usize),
}

/// Parser for the length-prefixed request framing.
#[derive(Debug, Default)]
pub struct FrameParser;

impl FrameParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one request frame from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, FrameError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let body_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if body_len > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge {
                size: body_len,
                max: MAX_FRAME_SIZE,
            });
        }
        if buf.len() < HEADER_SIZE + body_len {
            return Ok(None);
        }

        let mut body = &buf[HEADER_SIZE..HEADER_SIZE + body_len];

        if body.remaining() < 4 {
            return Err(FrameError::ArgOverrun);
        }
        let nargs = body.get_u32_le() as usize;
        if nargs > MAX_ARGS {
            return Err(FrameError::TooManyArgs {
                count: nargs,
                max: MAX_ARGS,
            });
        }

        let mut args = Vec::new();
        while args.len() < nargs {
            if body.remaining() < 4 {
                return Err(FrameError::ArgOverrun);
            }
            let arg_len = body.get_u32_le() as usize;
            if body.remaining() < arg_len {
                return Err(FrameError::ArgOverrun);
            }
            args.push(Bytes::copy_from_slice(&body[..arg_len]));
            body.advance(arg_len);
        }

        // The argument vector must account for the entire announced body.
        if body.has_remaining() {
            return Err(FrameError::TrailingBytes(body.remaining()));
        }

        Ok(Some((Request::new(args), HEADER_SIZE + body_len)))
    }
}

/// Parses a single frame from a byte slice. Convenience wrapper for tests
/// and one-shot callers.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Request, usize)>, FrameError> {
    FrameParser::new().parse(buf)
}

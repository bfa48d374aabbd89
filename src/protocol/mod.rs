//! Wire Protocol Implementation
//!
//! The length-prefixed binary protocol driftkv speaks over TCP.
//!
//! - `types`: frame constants, `Status`, `Request` and `Response` with
//!   their wire encodings
//! - `parser`: the incremental request-frame parser
//!
//! ## Example
//!
//! ```
//! use driftkv::protocol::{parse_frame, Request};
//! use bytes::{Bytes, BytesMut};
//!
//! // Encode a request the way a client would...
//! let mut buf = BytesMut::new();
//! Request::new(vec![Bytes::from("get"), Bytes::from("name")]).encode_into(&mut buf);
//!
//! // ...and parse it back the way the server does.
//! let (request, consumed) = parse_frame(&buf).unwrap().unwrap();
//! assert_eq!(consumed, buf.len());
//! assert_eq!(request.args[0], Bytes::from("get"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_frame, FrameError, FrameParser};
pub use types::{Request, Response, Status, HEADER_SIZE, MAX_ARGS, MAX_FRAME_SIZE};

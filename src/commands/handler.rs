//! Command Execution
//!
//! Maps a parsed [`Request`] onto a [`Store`] operation and shapes the
//! [`Response`]. The command table:
//!
//! | Command              | Response                                              |
//! |----------------------|-------------------------------------------------------|
//! | `get K`              | `OK` + value, or `NX` if absent/expired               |
//! | `set K V`            | `OK`                                                  |
//! | `set ex K V S`       | `OK`; expires after `S` whole seconds                 |
//! | `del K`              | `OK` (absent key is a no-op)                          |
//! | `ttl K`              | `OK` + remaining seconds, `NX`, or `ERR` if no expiry |
//! | `lru_evict`          | `OK`, or `ERR` when the store is empty                |
//! | `lfu_evict`          | `OK`, or `ERR` when the store is empty                |
//!
//! Command names are case-sensitive. Any other shape — unknown name, wrong
//! arity, malformed seconds — answers `ERR` with an empty payload; a
//! semantically invalid command never costs the client its connection.

use crate::protocol::{Request, Response};
use crate::storage::{Store, TtlError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Executes commands against the shared store.
///
/// Cheap to clone: one handler is created per connection, all sharing the
/// same store.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Executes one request and returns the response to send back.
    pub fn execute(&self, request: Request) -> Response {
        let args = &request.args;
        let Some(name) = args.first() else {
            return Response::err();
        };

        match name.as_ref() {
            b"get" if args.len() == 2 => self.cmd_get(&args[1]),
            b"set" if args.len() == 3 => self.cmd_set(args[1].clone(), args[2].clone()),
            // `set ex K V S`; only argument 1 being the literal `ex` selects
            // this form, so `set ex V` still writes the key "ex".
            b"set" if args.len() == 5 && args[1].as_ref() == b"ex" => {
                self.cmd_set_ex(args[2].clone(), args[3].clone(), &args[4])
            }
            b"del" if args.len() == 2 => self.cmd_del(&args[1]),
            b"ttl" if args.len() == 2 => self.cmd_ttl(&args[1]),
            b"lru_evict" if args.len() == 1 => self.cmd_lru_evict(),
            b"lfu_evict" if args.len() == 1 => self.cmd_lfu_evict(),
            _ => Response::err(),
        }
    }

    fn cmd_get(&self, key: &Bytes) -> Response {
        match self.store.get(key) {
            Some(value) => Response::ok_with(value),
            None => Response::nx(),
        }
    }

    fn cmd_set(&self, key: Bytes, value: Bytes) -> Response {
        self.store.set(key, value);
        Response::ok()
    }

    fn cmd_set_ex(&self, key: Bytes, value: Bytes, seconds: &Bytes) -> Response {
        let Some(seconds) = parse_seconds(seconds) else {
            return Response::err();
        };
        self.store
            .set_with_ttl(key, value, Duration::from_secs(seconds));
        Response::ok()
    }

    fn cmd_del(&self, key: &Bytes) -> Response {
        self.store.delete(key);
        Response::ok()
    }

    fn cmd_ttl(&self, key: &Bytes) -> Response {
        match self.store.ttl(key) {
            Ok(seconds) => Response::ok_with(Bytes::from(seconds.to_string())),
            Err(TtlError::NotFound) => Response::nx(),
            Err(TtlError::NoExpiry) => Response::err(),
        }
    }

    fn cmd_lru_evict(&self) -> Response {
        match self.store.evict_lru() {
            Some(_) => Response::ok(),
            None => Response::err(),
        }
    }

    fn cmd_lfu_evict(&self) -> Response {
        match self.store.evict_lfu() {
            Some(_) => Response::ok(),
            None => Response::err(),
        }
    }
}

/// Parses the `S` argument of `set ex`: ASCII decimal seconds.
fn parse_seconds(arg: &Bytes) -> Option<u64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

//! # driftkv — an in-memory cache server built on progressive rehashing
//!
//! driftkv is a single-node key-value cache server speaking a
//! length-prefixed binary protocol. Its center of gravity is a hash table
//! that resizes incrementally — entries drift from the old table to the new
//! one a bucket at a time — so no request ever stalls behind a full rehash.
//! On top of that sit TTL expiration and both LRU and LFU eviction, kept
//! consistent with the map under a single lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            driftkv                             │
//! │                                                                │
//! │  ┌────────────┐   ┌─────────────┐   ┌────────────────┐         │
//! │  │  TCP       │──>│ Connection  │──>│ CommandHandler │         │
//! │  │  Listener  │   │  Handler    │   └───────┬────────┘         │
//! │  └────────────┘   └─────────────┘           │                  │
//! │                                             ▼                  │
//! │  ┌────────────┐   ┌──────────────────────────────────────────┐ │
//! │  │  Frame     │   │              Store (Mutex)               │ │
//! │  │  Parser    │   │  ProgressiveMap · LRU · LFU · TTL index  │ │
//! │  └────────────┘   └──────────────────────────────────────────┘ │
//! │                                             ▲                  │
//! │                            ┌────────────────┴───────────┐      │
//! │                            │       ExpirySweeper        │      │
//! │                            │   (background tokio task)  │      │
//! │                            └────────────────────────────┘      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commands
//!
//! - `set K V` / `set ex K V S` — insert or replace, optionally with a TTL
//! - `get K` — read a value (bumps recency and frequency)
//! - `del K` — remove a key
//! - `ttl K` — remaining whole seconds before expiry
//! - `lru_evict` — drop the least-recently-used key
//! - `lfu_evict` — drop the least-frequently-used key (oldest wins ties)
//!
//! ## Module Overview
//!
//! - [`protocol`]: binary frame parser and response encoding
//! - [`storage`]: the progressive map, eviction indices, store and sweeper
//! - [`commands`]: command dispatch against the store
//! - [`connection`]: per-client framed I/O loop
//!
//! ## Quick Start
//!
//! ```ignore
//! use driftkv::commands::CommandHandler;
//! use driftkv::connection::{handle_connection, ConnectionStats};
//! use driftkv::storage::{start_expiry_sweeper, Store};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(Store::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&store));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("0.0.0.0:2203").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&store));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{FrameError, FrameParser, Request, Response, Status};
pub use storage::{start_expiry_sweeper, ExpirySweeper, ProgressiveMap, Store, SweeperConfig};

/// The default port driftkv listens on
pub const DEFAULT_PORT: u16 = 2203;

/// The default host driftkv binds to (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of driftkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

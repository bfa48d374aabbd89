//! Command Processing Layer
//!
//! Sits between the wire protocol and the storage layer: takes a parsed
//! [`Request`](crate::protocol::Request), runs it against the
//! [`Store`](crate::storage::Store) and produces the
//! [`Response`](crate::protocol::Response) the connection writes back.
//!
//! ```text
//! ┌─────────────────┐
//! │  frame parser   │  (protocol module)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │      Store      │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;

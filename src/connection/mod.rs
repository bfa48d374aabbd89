//! Connection Management
//!
//! Each accepted socket gets its own handler task running the framed
//! read-execute-flush loop. Requests on one connection are processed and
//! answered strictly in arrival order; across connections the interleaving
//! is whatever the store's lock hands out.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  TCP Listener (main.rs)              │
//! └──────────────────────┬───────────────────────────────┘
//!                        │ accept()
//!                        ▼
//!              one task per connection
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                    │
//! │  read bytes ─> parse frames ─> execute ─> flush      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};

//! Connection Handler
//!
//! One handler per client. The loop mirrors the data flow of the protocol:
//!
//! ```text
//! socket ──> incoming buffer ──> frame parser ──> CommandHandler
//!                                                       │
//! socket <── outgoing buffer <── response encoding <────┘
//! ```
//!
//! TCP delivers a byte stream, so a single read may carry a partial frame
//! or a whole pipeline of requests. Each wakeup drains every complete frame
//! from the incoming buffer in arrival order, appends all responses to the
//! outgoing buffer, and flushes once — so pipelined clients get pipelined
//! answers.
//!
//! ## Closing Rules
//!
//! - Protocol violation (oversized or malformed frame): close, no reply to
//!   the offending frame. Responses already owed are flushed first.
//! - Unknown-but-well-formed command: `ERR` response, connection stays.
//! - Peer EOF: clean disconnect, or `UnexpectedEof` if it cuts a frame.
//! - I/O error: logged, connection closed; other connections are untouched.

use crate::commands::CommandHandler;
use crate::protocol::{FrameError, FrameParser, HEADER_SIZE, MAX_FRAME_SIZE};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// The incoming buffer may hold at most one maximum-size frame plus its
/// header; a peer that buffers more without completing a frame is broken.
const MAX_BUFFER_SIZE: usize = HEADER_SIZE + MAX_FRAME_SIZE;

/// Initial capacity of the incoming buffer.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Connection-level counters, shared across all handler tasks.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total request frames processed
    pub frames_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame violated the protocol; closed without replying to it
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// Client disconnected between frames
    #[error("client disconnected")]
    ClientDisconnected,

    /// Stream ended in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Incoming buffer limit exceeded
    #[error("connection buffer limit exceeded")]
    BufferFull,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet parsed
    incoming: BytesMut,

    /// Encoded responses awaiting a flush
    outgoing: BytesMut,

    /// The command handler (shares the store with every connection)
    command_handler: CommandHandler,

    /// Frame parser
    parser: FrameParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            incoming: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            outgoing: BytesMut::new(),
            command_handler,
            parser: FrameParser::new(),
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection closed on error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The read-execute-flush loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            loop {
                match self.try_parse_frame() {
                    Ok(Some(request)) => {
                        let response = self.command_handler.execute(request);
                        self.stats.frame_processed();
                        response.encode_into(&mut self.outgoing);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Earlier frames in the pipeline still get their
                        // responses; the offending frame gets none.
                        let _ = self.flush_outgoing().await;
                        return Err(e);
                    }
                }
            }

            self.flush_outgoing().await?;
            self.read_more_data().await?;
        }
    }

    /// Attempts to parse one frame off the front of the incoming buffer.
    fn try_parse_frame(&mut self) -> Result<Option<crate::protocol::Request>, ConnectionError> {
        if self.incoming.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.incoming) {
            Ok(Some((request, consumed))) => {
                self.incoming.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.incoming.len(),
                    "Parsed frame"
                );
                Ok(Some(request))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Protocol error");
                Err(ConnectionError::Protocol(e))
            }
        }
    }

    /// Reads more data from the socket into the incoming buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.incoming.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.incoming.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        let n = self.stream.get_mut().read_buf(&mut self.incoming).await?;

        if n == 0 {
            if self.incoming.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            return Err(ConnectionError::UnexpectedEof);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes every pending response and flushes the stream.
    async fn flush_outgoing(&mut self) -> Result<(), ConnectionError> {
        if self.outgoing.is_empty() {
            return Ok(());
        }

        self.stream.write_all(&self.outgoing).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(self.outgoing.len());
        trace!(
            client = %self.addr,
            bytes = self.outgoing.len(),
            "Flushed responses"
        );
        self.outgoing.clear();
        Ok(())
    }
}

/// Handles a client connection to completion, logging any terminal error.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

//! Per-connection read/dispatch/write loop.
//!
//! Each accepted socket gets its own tokio task running a [`Connection`].
//! TCP is a byte stream, so a single read may hold half a command or three
//! pipelined ones; the loop appends every read to an accumulation buffer
//! and drains complete frames through the parser before reading again.
//! A command split across two reads is reassembled, and multiple frames in
//! one read are each answered in order.
//!
//! The core never decides a connection's fate. This layer does: a clean
//! zero-length read ends the task, and after a protocol error the RESP
//! error reply is written back and the connection closed, since the rest
//! of the buffer can no longer be framed.

use crate::commands::Dispatcher;
use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Hard cap on buffered unparsed input per connection (64 KB).
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial accumulation buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Process-wide connection and command counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Peer closed the socket with no partial frame buffered.
    #[error("client disconnected")]
    Disconnected,

    /// Peer closed the socket mid-frame.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("input buffer limit exceeded")]
    BufferFull,
}

/// State for one client connection.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    dispatcher: Dispatcher,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: Dispatcher,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            parser: RespParser::new(),
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.serve().await;

        match &result {
            Ok(()) | Err(ConnectionError::Disconnected) => {
                debug!(client = %self.addr, "client disconnected");
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client");
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection ended"),
        }

        self.stats.connection_closed();
        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete frame already buffered before reading
            // again, so pipelined commands are answered without extra
            // round trips.
            loop {
                match self.next_request() {
                    Ok(Some(request)) => {
                        let reply = self.dispatcher.dispatch(request);
                        self.stats.command_processed();
                        self.write_reply(&reply).await?;
                    }
                    Ok(None) => break,
                    Err(parse_err) => {
                        // Report the malformed frame to the peer, then close:
                        // the remaining buffered bytes cannot be re-framed.
                        warn!(client = %self.addr, error = %parse_err, "protocol error");
                        let reply =
                            RespValue::error(format!("ERR protocol error: {}", parse_err));
                        self.write_reply(&reply).await?;
                        return Err(parse_err.into());
                    }
                }
            }

            self.fill_buffer().await?;
        }
    }

    /// Pulls one complete frame out of the accumulation buffer, if present.
    fn next_request(&mut self) -> Result<Option<RespValue>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((request, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed,
                    buffered = self.buffer.len(),
                    "decoded frame"
                );
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    async fn fill_buffer(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(client = %self.addr, buffered = self.buffer.len(), "buffer limit hit");
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::Disconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(client = %self.addr, bytes = n, "read");
        Ok(())
    }

    async fn write_reply(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(client = %self.addr, bytes = bytes.len(), "wrote reply");
        Ok(())
    }
}

/// Runs one client connection to completion, swallowing the expected
/// disconnect outcomes so the spawned task never propagates them.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
) {
    let connection = Connection::new(stream, addr, dispatcher, stats);
    if let Err(e) = connection.run().await {
        match e {
            ConnectionError::Disconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => debug!(client = %addr, error = %e, "connection task ended with error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());

        let store_clone = Arc::clone(&store);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let dispatcher = Dispatcher::new(Arc::clone(&store_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, dispatcher, stats));
            }
        });

        (addr, store, stats)
    }

    async fn read_reply(client: &mut TcpStream, expected_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut total = 0;
        while total < expected_len {
            let n = client.read(&mut buf[total..]).await.unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        buf
    }

    #[tokio::test]
    async fn ping_over_tcp() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_reply(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn echo_over_tcp() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client, 9).await, b"$3\r\nhey\r\n");
    }

    #[tokio::test]
    async fn set_get_over_tcp() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client, 5).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client, 9).await, b"$3\r\nbar\r\n");
    }

    #[tokio::test]
    async fn get_missing_key_over_tcp() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$10\r\nmissingkey\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client, 5).await, b"$-1\r\n");
    }

    #[tokio::test]
    async fn pipelined_commands_answered_in_order() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(
                b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n\
                  *3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk1\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk2\r\n",
            )
            .await
            .unwrap();

        // +OK\r\n +OK\r\n $2\r\nv1\r\n $2\r\nv2\r\n
        let reply = read_reply(&mut client, 26).await;
        assert_eq!(reply, b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n");
    }

    #[tokio::test]
    async fn frame_split_across_reads_is_reassembled() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$4\r\nEC").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(b"HO\r\n$3\r\nhey\r\n").await.unwrap();

        assert_eq!(read_reply(&mut client, 9).await, b"$3\r\nhey\r\n");
    }

    #[tokio::test]
    async fn unknown_command_over_tcp() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$3\r\nFOO\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.starts_with('-'));
        assert!(text.contains("unknown command"));
    }

    #[tokio::test]
    async fn malformed_frame_gets_error_reply_then_close() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b":42\r\n").await.unwrap();

        let mut buf = [0u8; 128];
        let n = client.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"-ERR protocol error"));

        // The handler closes after a protocol error.
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn stats_track_connections_and_commands() {
        let (addr, _, stats) = spawn_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();

        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}

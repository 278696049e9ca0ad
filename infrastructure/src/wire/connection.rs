//! TCP connection to the debugger server.

use super::codec::FrameDecoder;
use super::error::ConnectionError;
use async_trait::async_trait;
use bytes::BytesMut;
use harness_application::{ChannelError, Connector, MessageChannel};
use harness_domain::Message;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

/// Default size of a single socket read.
pub const DEFAULT_READ_CHUNK: usize = 4096;

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Ask the OS for a port on `host` that is free right now.
///
/// The listener is dropped before returning, so another process could
/// take the port in between; callers pass it straight to the server.
pub fn unused_local_port(host: &str) -> std::io::Result<u16> {
    let listener = TcpListener::bind((host, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// One socket to the server with its own decode buffer.
pub struct TcpConnection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    decoder: FrameDecoder,
    buffer: BytesMut,
    chunk_size: usize,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, chunk_size: usize) -> Result<Self, ConnectionError> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream: Some(stream),
            peer,
            decoder: FrameDecoder::new(),
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
        })
    }

    /// Connect to `host:port`, retrying refused connections until `timeout`.
    ///
    /// The server may still be setting up its listener right after printing
    /// its banner.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        chunk_size: usize,
    ) -> Result<Self, ConnectionError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || ConnectionError::Timeout {
            waited: timeout,
            expected: 0,
            received: Vec::new(),
        };

        loop {
            match tokio::time::timeout_at(deadline, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => {
                    debug!("Connected to {}:{}", host, port);
                    return Self::new(stream, chunk_size);
                }
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    if Instant::now() + CONNECT_RETRY_DELAY >= deadline {
                        return Err(timed_out());
                    }
                    trace!("Connection to {}:{} refused, retrying", host, port);
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(timed_out()),
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Write `bytes` in full, bounded by `timeout`.
    pub async fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(result) => {
                result?;
                trace!("Sent {} bytes to {}", bytes.len(), self.peer);
                Ok(())
            }
            Err(_) => Err(ConnectionError::Timeout {
                waited: timeout,
                expected: 0,
                received: Vec::new(),
            }),
        }
    }

    /// Read until at least `expected` messages are decoded or `timeout`
    /// elapses.
    ///
    /// Every message decoded from the bytes read is returned, which may be
    /// more than `expected`. On timeout or peer close the messages decoded so
    /// far travel in the error.
    pub async fn read_messages(
        &mut self,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, ConnectionError> {
        let deadline = Instant::now() + timeout;
        let mut received = self.decoder.decode_all(&mut self.buffer)?;

        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;
        let mut chunk = vec![0u8; self.chunk_size];

        while received.len() < expected {
            let read = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!(
                        "Read from {} timed out with {} of {} message(s)",
                        self.peer,
                        received.len(),
                        expected
                    );
                    return Err(ConnectionError::Timeout {
                        waited: timeout,
                        expected,
                        received,
                    });
                }
            };

            if read == 0 {
                while let Some(message) = self.decoder.decode_eof(&mut self.buffer)? {
                    received.push(message);
                }
                debug!("{} closed the connection", self.peer);
                return Err(ConnectionError::Closed { received });
            }

            trace!("Read {} bytes from {}", read, self.peer);
            self.buffer.extend_from_slice(&chunk[..read]);
            while let Some(message) = self.decoder.decode(&mut self.buffer)? {
                received.push(message);
            }
        }

        Ok(received)
    }

    /// Release the socket. Calling this again does nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            self.buffer.clear();
            debug!("Closed connection to {}", self.peer);
        }
    }
}

#[async_trait]
impl MessageChannel for TcpConnection {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    async fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), ChannelError> {
        TcpConnection::send(self, bytes, timeout)
            .await
            .map_err(Into::into)
    }

    async fn read_messages(
        &mut self,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, ChannelError> {
        TcpConnection::read_messages(self, expected, timeout)
            .await
            .map_err(Into::into)
    }

    async fn close(&mut self) {
        TcpConnection::close(self).await
    }
}

/// Opens [`TcpConnection`]s.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    chunk_size: usize,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CHUNK)
    }
}

impl TcpConnector {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn MessageChannel>, ChannelError> {
        let connection = TcpConnection::connect(host, port, timeout, self.chunk_size).await?;
        Ok(Box::new(connection))
    }

    fn allocate_port(&self, host: &str) -> Result<u16, ChannelError> {
        unused_local_port(host).map_err(|e| ChannelError::Connection(e.to_string()))
    }
}

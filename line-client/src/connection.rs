use std::{
    fmt, io,
    sync::atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};
use tracing::{debug, info};

const DELIMITER: u8 = b'\n';

/// Remote address as given on the command line, resolved lazily at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Cannot connect to {endpoint}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    #[error("connection is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A line-oriented TCP channel.
///
/// The socket is split into halves that sit behind independent locks, so one
/// task may block in [`Connection::read_line`] while another calls
/// [`Connection::send_line`].
pub struct Connection {
    endpoint: Endpoint,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

impl Connection {
    /// Opens the channel. Nothing usable is returned unless the socket connected.
    pub async fn connect(endpoint: Endpoint) -> Result<Self, ConnectionError> {
        let stream = match TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await {
            Ok(stream) => stream,
            Err(source) => return Err(ConnectionError::Connect { endpoint, source }),
        };

        info!(%endpoint, "connected");
        Ok(Self::from_stream(endpoint, stream))
    }

    fn from_stream(endpoint: Endpoint, stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            endpoint,
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends `line` followed by the record delimiter.
    ///
    /// Fails with [`ConnectionError::Closed`] without touching the socket once
    /// the peer has been observed to close the channel.
    pub async fn send_line(&self, line: &[u8]) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line);
        frame.push(DELIMITER);

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!(bytes = frame.len(), "sent line");
        Ok(())
    }

    /// Waits for the next full line, returning its raw bytes without the delimiter.
    ///
    /// Returns `Ok(None)` at end-of-stream. A trailing fragment left unterminated
    /// by the peer is still delivered as a final line.
    pub async fn read_line(&self) -> Result<Option<Vec<u8>>, ConnectionError> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();
        let bytes = match reader.read_until(DELIMITER, &mut buf).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.mark_closed();
                return Err(err.into());
            }
        };
        if bytes == 0 {
            self.mark_closed();
            return Ok(None);
        }

        if buf.last() == Some(&DELIMITER) {
            buf.pop();
        }
        Ok(Some(buf))
    }

    /// Shuts down the send side; the peer sees end-of-stream while reads continue.
    pub async fn shutdown_send(&self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        debug!(endpoint = %self.endpoint, "send side shut down");
        Ok(())
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(endpoint = %self.endpoint, "connection closed by peer");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

//! The duplex session loop.
//!
//! A session pairs one [`Connection`] with a spawned reader task, which drains
//! inbound lines to the local output, and a writer loop on the caller's task,
//! which forwards local input until the user types `quit`. The reader has no
//! cancellation signal: it finishes only when the transport reports
//! end-of-stream or an error, and the session joins it before returning.

use std::{io, sync::Arc};

use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionError};

/// Line that ends the writer loop, compared case-insensitively.
pub const QUIT_COMMAND: &str = "quit";

/// Printed once by the reader task when the inbound stream ends.
pub const DISCONNECT_NOTICE: &str = "Client disconnected";

pub fn is_quit_command(line: &[u8]) -> bool {
    line.eq_ignore_ascii_case(QUIT_COMMAND.as_bytes())
}

/// Removes the trailing `\n` from a line of local input. A `\r` before it is kept.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Shut down the send side after `quit` so the peer sees end-of-stream.
    pub half_close_on_quit: bool,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read local input")]
    Input(#[source] io::Error),
    #[error("failed to send line")]
    Send(#[source] ConnectionError),
    #[error("failed to write to local output")]
    Output(#[source] io::Error),
    #[error("reader task did not complete")]
    ReaderTask(#[from] JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// The user sent the quit command.
    Quit,
    /// Local input reached end-of-file before any quit command.
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterReport {
    pub exit: WriterExit,
    pub lines_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub writer: WriterReport,
    pub lines_received: usize,
}

pub struct Session {
    connection: Arc<Connection>,
    reader: JoinHandle<Result<usize, SessionError>>,
    config: SessionConfig,
}

impl Session {
    /// Takes ownership of an open connection and starts the reader task.
    ///
    /// The reader is already draining the socket when this returns, so lines the
    /// peer sends before the writer loop starts are not lost.
    pub fn start<O>(connection: Connection, output: O, config: SessionConfig) -> Self
    where
        O: AsyncWrite + Send + Unpin + 'static,
    {
        let connection = Arc::new(connection);
        let reader = tokio::spawn(run_reader(Arc::clone(&connection), output));
        debug!(endpoint = %connection.endpoint(), "reader task started");
        Self {
            connection,
            reader,
            config,
        }
    }

    /// Forwards local input line by line until `quit` is sent or input ends.
    ///
    /// A failed send is returned immediately; nothing is retried.
    pub async fn run_writer<I>(&self, input: &mut I) -> Result<WriterReport, SessionError>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines_sent = 0;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes = input
                .read_until(b'\n', &mut buf)
                .await
                .map_err(SessionError::Input)?;

            if bytes == 0 {
                info!("local input closed");
                self.half_close().await;
                return Ok(WriterReport {
                    exit: WriterExit::InputClosed,
                    lines_sent,
                });
            }

            let line = strip_line_ending(&buf);
            self.connection
                .send_line(line)
                .await
                .map_err(SessionError::Send)?;
            lines_sent += 1;

            if is_quit_command(line) {
                info!(lines_sent, "quit command sent");
                if self.config.half_close_on_quit {
                    self.half_close().await;
                }
                return Ok(WriterReport {
                    exit: WriterExit::Quit,
                    lines_sent,
                });
            }
        }
    }

    /// Waits for the reader task and returns how many lines it relayed.
    pub async fn join(self) -> Result<usize, SessionError> {
        self.reader.await?
    }

    /// Ends the session after a fatal writer error.
    ///
    /// If the peer already closed the channel the reader is finishing on its own
    /// and is joined so its disconnect notice is flushed; otherwise it is aborted.
    async fn abandon(self) {
        if !self.connection.is_closed() {
            self.reader.abort();
        }
        if let Ok(Err(err)) = self.reader.await {
            warn!(error = %err, "reader task failed");
        }
    }

    async fn half_close(&self) {
        if let Err(err) = self.connection.shutdown_send().await {
            warn!(error = %err, "failed to shut down send side");
        }
    }
}

/// Runs a whole session: reader task, writer loop, then the join.
pub async fn run<I, O>(
    connection: Connection,
    mut input: I,
    output: O,
    config: SessionConfig,
) -> Result<SessionSummary, SessionError>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Send + Unpin + 'static,
{
    let session = Session::start(connection, output, config);

    let writer = match session.run_writer(&mut input).await {
        Ok(report) => report,
        Err(err) => {
            session.abandon().await;
            return Err(err);
        }
    };

    debug!("waiting for reader task");
    let lines_received = session.join().await?;
    Ok(SessionSummary {
        writer,
        lines_received,
    })
}

async fn run_reader<O>(connection: Arc<Connection>, mut output: O) -> Result<usize, SessionError>
where
    O: AsyncWrite + Unpin,
{
    let mut lines_received = 0;
    loop {
        match connection.read_line().await {
            Ok(Some(line)) => {
                write_line(&mut output, &line)
                    .await
                    .map_err(SessionError::Output)?;
                lines_received += 1;
            }
            Ok(None) => {
                debug!("peer closed the connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "read from connection failed");
                break;
            }
        }
    }

    write_line(&mut output, DISCONNECT_NOTICE.as_bytes())
        .await
        .map_err(SessionError::Output)?;
    Ok(lines_received)
}

async fn write_line<O>(output: &mut O, line: &[u8]) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    // One buffer per line keeps a line whole on the terminal.
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line);
    buf.push(b'\n');
    output.write_all(&buf).await?;
    output.flush().await
}

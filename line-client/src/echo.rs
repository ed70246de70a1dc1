//! A line echo peer for demos and tests.
//!
//! Every accepted connection gets its own task, which writes each received
//! line straight back and hangs up after echoing the quit command.

use std::{future::Future, net::SocketAddr};

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, warn};

use crate::session::{is_quit_command, strip_line_ending};

pub struct EchoServer {
    listener: TcpListener,
}

impl EchoServer {
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let EchoServer { listener } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("echo server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>) {
    match result {
        Ok((stream, peer)) => spawn_echo_handler(stream, peer),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_echo_handler(stream: TcpStream, peer: SocketAddr) {
    info!(peer = %peer, "accepted connection");
    tokio::spawn(async move {
        match echo_lines(stream).await {
            Ok(echoed) => info!(peer = %peer, echoed, "connection closed"),
            Err(err) => warn!(peer = %peer, error = ?err, "connection closed with error"),
        }
    });
}

async fn echo_lines(stream: TcpStream) -> std::io::Result<usize> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut echoed = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            debug!("peer reached end-of-stream");
            break;
        }

        writer.write_all(&buf).await?;
        if buf.last() != Some(&b'\n') {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        echoed += 1;

        if is_quit_command(strip_line_ending(&buf)) {
            debug!("quit received, hanging up");
            break;
        }
    }

    writer.shutdown().await?;
    Ok(echoed)
}

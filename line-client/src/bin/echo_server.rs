//! Standalone echo peer for trying the client by hand.
//!
//! ```bash
//! cargo run --bin echo-server -- --listen 127.0.0.1:5555
//! cargo run --bin line-client -- 127.0.0.1 5555
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::warn;

use line_client::{cli::EchoCli, echo::EchoServer, telemetry::init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let cli = EchoCli::parse();
    let listener = TcpListener::bind(cli.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.server.listen))?;
    let server = EchoServer::new(listener);
    let addr = server.local_addr()?;
    println!("echo server listening on {addr}");

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("echo server exited with error: {err:?}");
        return Err(err);
    }
    Ok(())
}

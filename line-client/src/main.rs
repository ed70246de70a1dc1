use std::{future::Future, io, process::ExitCode};

use clap::{Parser, error::ErrorKind};
use tokio::{io::BufReader, select};
use tracing::{info, warn};

use line_client::{
    cli::Cli,
    connection::Connection,
    session::{self, SessionSummary},
    telemetry::init_tracing,
};

const EXIT_CONNECT_FAILED: u8 = 1;
const EXIT_SESSION_FAILED: u8 = 2;
const EXIT_INTERRUPTED: i32 = 130;
const EXIT_USAGE: u8 = 255;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("warn");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                return ExitCode::from(EXIT_USAGE);
            }
        },
    };

    let connection = match Connection::connect(cli.endpoint()).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("{err}");
            warn!(error = ?err, "connect failed");
            return ExitCode::from(EXIT_CONNECT_FAILED);
        }
    };

    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    select! {
        result = session::run(connection, input, output, cli.session_config()) => match result {
            Ok(summary) => {
                log_summary(&summary);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {:#}", anyhow::Error::from(err));
                ExitCode::from(EXIT_SESSION_FAILED)
            }
        },
        _ = interrupted(tokio::signal::ctrl_c()) => {
            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

/// Resolves once the signal arrives. Never resolves if the handler could not be installed.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(error) = signal.await {
        warn!(?error, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
}

fn log_summary(summary: &SessionSummary) {
    info!(
        exit = ?summary.writer.exit,
        lines_sent = summary.writer.lines_sent,
        lines_received = summary.lines_received,
        "session finished"
    );
}

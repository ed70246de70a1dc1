use std::net::SocketAddr;

use clap::{Args, Parser};

use crate::{connection::Endpoint, session::SessionConfig};

/// Interactive line client: relays stdin to a TCP peer and prints what it sends back.
#[derive(Parser, Debug)]
#[command(name = "line-client", author, version, about, long_about = None)]
pub struct Cli {
    /// Host name or address of the server.
    pub host: String,

    /// TCP port of the server.
    #[arg(value_parser = parse_port_lossy, allow_hyphen_values = true)]
    pub port: u16,

    /// After sending `quit`, shut down the send side so the server sees end-of-stream.
    #[arg(long)]
    pub half_close: bool,
}

impl Cli {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            half_close_on_quit: self.half_close,
        }
    }
}

/// Arguments for the `echo-server` binary.
#[derive(Parser, Debug)]
#[command(name = "echo-server", author, version, about = "Echo every received line back to the sender")]
pub struct EchoCli {
    #[command(flatten)]
    pub server: EchoArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EchoArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:5555")]
    pub listen: SocketAddr,
}

/// Converts a port argument the way C's `atoi` followed by a 16-bit cast would.
///
/// Leading whitespace and one sign are accepted, digits are read up to the first
/// non-digit, and the result wraps modulo 2^16. Input with no digits yields 0.
pub fn parse_port_lossy(raw: &str) -> Result<u16, String> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u16, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add(u16::from(digit - b'0'))
        });

    Ok(if negative { value.wrapping_neg() } else { value })
}

//! Interactive line-oriented TCP client.
//!
//! The client connects to one server, prints every line the server sends, and
//! forwards every line typed on stdin until the user enters `quit`.
//!
//! - [`cli`] parses the command-line interface for the client and the echo peer.
//! - [`connection`] owns the socket and its newline framing, with send and
//!   receive usable concurrently from different tasks.
//! - [`session`] runs the reader task and the writer loop and joins them.
//! - [`echo`] is a small echo server used for demos and tests.
//! - [`telemetry`] sets up `tracing` output.

pub mod cli;
pub mod connection;
pub mod echo;
pub mod session;
pub mod telemetry;

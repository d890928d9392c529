//! A minimal SMTP client for delivering plain-text notifications.
//!
//! One call to [`SmtpTransport::send`] opens a fresh connection, walks the
//! [`Session`] state machine from greeting to `QUIT`, and closes the socket
//! before returning.

pub mod connection;
pub mod message;
pub mod reply;
pub mod session;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use connection::Connection;
pub use message::{compose, dot_stuff, Headers, Mailbox};
pub use reply::Reply;
pub use session::{AuthPrompt, Session, SessionState};
pub use transport::SmtpTransport;

/// How the connection to the server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// TLS from the first byte (SMTPS, port 465).
    ImplicitTls,
    /// Plaintext connect followed by a `STARTTLS` upgrade (submission, port 587).
    StartTls,
    /// No encryption.
    Plain,
}

impl SecurityMode {
    /// Derives the security mode from the server port.
    pub fn from_port(port: u16) -> Self {
        match port {
            465 => SecurityMode::ImplicitTls,
            587 => SecurityMode::StartTls,
            _ => SecurityMode::Plain,
        }
    }
}

/// Broad classes of delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// DNS, connect or TLS negotiation failed, or the server hung up.
    Connection,
    /// A connect, handshake or read deadline expired.
    Timeout,
    /// The server answered with a status code other than the expected one.
    Protocol,
    /// The message could not be sent as given (e.g. a malformed address).
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {after:?} while {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("TLS negotiation failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("`{command}` rejected: expected {expected}, server replied {reply}")]
    UnexpectedReply {
        command: String,
        expected: u16,
        reply: Reply,
    },

    #[error("malformed server reply: {0:?}")]
    MalformedReply(String),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("`{command}` is not valid in session state {state:?}")]
    OutOfOrder {
        command: &'static str,
        state: SessionState,
    },

    #[error("invalid mailbox address: {0:?}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SmtpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SmtpError::Connect { .. }
            | SmtpError::Tls(_)
            | SmtpError::ConnectionClosed
            | SmtpError::Io(_) => ErrorKind::Connection,
            SmtpError::Timeout { .. } => ErrorKind::Timeout,
            SmtpError::UnexpectedReply { .. }
            | SmtpError::MalformedReply(_)
            | SmtpError::OutOfOrder { .. } => ErrorKind::Protocol,
            SmtpError::InvalidAddress(_) => ErrorKind::InvalidInput,
        }
    }

    /// The server reply that caused the failure, if any.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            SmtpError::UnexpectedReply { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

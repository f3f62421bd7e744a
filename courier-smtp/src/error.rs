//! Error types for the SMTP client.

use std::io;

use thiserror::Error;

/// Errors that can occur while talking to the relay.
#[derive(Error, Debug)]
pub enum ClientError {
    /// IO error during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server's response could not be parsed.
    #[error("failed to parse SMTP response: {0}")]
    Parse(String),

    /// The server rejected a command with an error status code.
    #[error("SMTP error: {code} {message}")]
    Smtp { code: u16, message: String },

    /// Authentication was rejected by the relay.
    #[error("authentication failed: {code} {message}")]
    AuthRejected { code: u16, message: String },

    /// TLS negotiation or upgrade failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The connection was closed by the peer.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// An operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

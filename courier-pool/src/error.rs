//! Error types for pool operations.

use courier_smtp::ClientError;
use thiserror::Error;

/// Errors surfaced by [`Pool::checkout`](crate::Pool::checkout).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down; no further checkouts will succeed.
    #[error("connection pool is closed")]
    Closed,

    /// Establishing or validating a relay connection failed.
    #[error("transport failure: {0}")]
    Transport(#[from] ClientError),
}

/// Specialized `Result` type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

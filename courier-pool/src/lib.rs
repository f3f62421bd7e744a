//! Bounded SMTP connection pooling.
//!
//! The pool owns every relay connection the delivery pipeline uses. A
//! semaphore caps concurrent checkouts at the configured capacity; idle
//! connections are validated lazily at checkout and by a periodic sweep,
//! never on return.

mod connection;
mod error;
mod pool;

pub use connection::PooledConnection;
pub use error::{PoolError, Result};
pub use pool::{Credentials, Pool, PoolConfig};

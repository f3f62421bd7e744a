//! A live relay connection owned by the pool.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use courier_smtp::SmtpClient;
use tokio::sync::OwnedSemaphorePermit;

/// A connection checked out from the pool.
///
/// Holding this value is the exclusive right to use the underlying client;
/// the capacity permit travels with it, so dropping the connection (instead
/// of returning it) still frees its pool slot.
#[derive(Debug)]
pub struct PooledConnection {
    pub(crate) client: SmtpClient,
    pub(crate) created_at: Instant,
    pub(crate) _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Time since this connection was established.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Deref for PooledConnection {
    type Target = SmtpClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

/// An idle connection parked in the pool (no capacity permit attached).
pub(crate) struct IdleSlot {
    pub(crate) client: SmtpClient,
    pub(crate) created_at: Instant,
    pub(crate) last_used: Instant,
}

impl IdleSlot {
    /// Expiry check that needs no network round trip.
    pub(crate) fn is_expired(&self, max_lifetime: Duration, max_idle: Duration) -> bool {
        self.created_at.elapsed() > max_lifetime || self.last_used.elapsed() > max_idle
    }
}

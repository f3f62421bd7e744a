//! Types shared across the courier workspace.

use serde::{Deserialize, Serialize};

/// Lifecycle signal broadcast to long-running tasks.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}

/// Lifecycle status of a delivery request.
///
/// Transitions are driven by the delivery worker:
/// `Pending -> Sending -> { Sent | Retrying -> Sending | Failed }`.
/// `Cancelled` is reachable only through explicit external cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Queued, not yet picked up by the worker.
    Pending,
    /// Currently being transmitted.
    Sending,
    /// A transmit attempt failed; a re-submission has been scheduled.
    Retrying,
    /// Delivered to the relay.
    Sent,
    /// Gave up: attempt ceiling reached or a permanent error occurred.
    Failed,
    /// Cancelled externally before completion.
    Cancelled,
}

impl DeliveryStatus {
    /// Whether the worker will never touch a request in this status again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }
}

/// Advisory priority attached to a delivery request.
///
/// The queue is strict FIFO; priority is metadata carried for logging and
/// for callers that inspect the ledger, it does not reorder delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

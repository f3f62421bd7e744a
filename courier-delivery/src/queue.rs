use std::sync::Arc;

use chrono::Utc;
use courier_common::DeliveryStatus;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use ulid::Ulid;

use crate::error::{DeliveryError, Result};
use crate::request::DeliveryRequest;

/// Bounded delivery queue backed by a concurrent ledger.
///
/// The channel carries only request ids; the ledger holds every request
/// ever accepted and is never pruned, so callers can inspect terminal
/// requests after the fact. Enqueue never blocks: a full channel rejects
/// the request outright.
#[derive(Clone)]
pub struct DeliveryQueue {
    ledger: Arc<DashMap<Ulid, DeliveryRequest>>,
    tx: mpsc::Sender<Ulid>,
    default_max_attempts: u32,
}

impl DeliveryQueue {
    /// Create a queue with the given channel capacity, returning the
    /// consumer half for the worker.
    #[must_use]
    pub fn bounded(capacity: usize, default_max_attempts: u32) -> (Self, mpsc::Receiver<Ulid>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                ledger: Arc::new(DashMap::new()),
                tx,
                default_max_attempts,
            },
            rx,
        )
    }

    /// Accept a request for asynchronous delivery.
    ///
    /// Fills in the default attempt ceiling, records the request in the
    /// ledger, and pushes its id without waiting. A full queue rejects
    /// with `QueueFull`; a closed queue with `Shutdown`.
    pub fn enqueue(&self, mut request: DeliveryRequest) -> Result<Ulid> {
        if request.max_attempts == 0 {
            request.max_attempts = self.default_max_attempts;
        }
        request.status = DeliveryStatus::Pending;
        request.updated_at = Utc::now();

        let id = request.id;
        self.ledger.insert(id, request);

        match self.tx.try_send(id) {
            Ok(()) => Ok(id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.ledger.remove(&id);
                Err(DeliveryError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.ledger.remove(&id);
                Err(DeliveryError::Shutdown)
            }
        }
    }

    /// Re-submit an already ledgered request id after a retry delay.
    pub(crate) fn resubmit(&self, id: Ulid) -> Result<()> {
        match self.tx.try_send(id) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Shutdown),
        }
    }

    pub fn get(&self, id: &Ulid) -> Option<DeliveryRequest> {
        self.ledger.get(id).map(|entry| entry.value().clone())
    }

    /// Number of requests in the ledger, terminal ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Snapshot of every tracked request.
    #[must_use]
    pub fn all(&self) -> Vec<DeliveryRequest> {
        self.ledger
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Cancel a request that has not reached a terminal status.
    ///
    /// Returns `true` when the request was transitioned to `cancelled`.
    /// The worker skips cancelled ids when they surface from the channel.
    pub fn cancel(&self, id: &Ulid) -> bool {
        let Some(mut entry) = self.ledger.get_mut(id) else {
            return false;
        };
        let request = entry.value_mut();
        if request.status.is_terminal() {
            return false;
        }
        debug!(%id, "cancelling delivery request");
        request.status = DeliveryStatus::Cancelled;
        request.updated_at = Utc::now();
        true
    }

    pub(crate) fn set_status(&self, id: &Ulid, status: DeliveryStatus) {
        if let Some(mut entry) = self.ledger.get_mut(id) {
            let request = entry.value_mut();
            // A concurrent cancel must not be overwritten by a completing
            // attempt.
            if request.status.is_terminal() {
                return;
            }
            request.status = status;
            request.updated_at = Utc::now();
        }
    }

    /// Mark the start of a sending pass, incrementing the attempt count.
    /// Returns the updated request, or `None` when it is unknown or
    /// already terminal.
    pub(crate) fn begin_attempt(&self, id: &Ulid) -> Option<DeliveryRequest> {
        let mut entry = self.ledger.get_mut(id)?;
        let request = entry.value_mut();
        if request.status.is_terminal() {
            return None;
        }
        request.status = DeliveryStatus::Sending;
        request.attempts += 1;
        request.updated_at = Utc::now();
        Some(request.clone())
    }

    pub(crate) fn record_failure(&self, id: &Ulid, status: DeliveryStatus, error: &str) {
        if let Some(mut entry) = self.ledger.get_mut(id) {
            let request = entry.value_mut();
            if request.status.is_terminal() {
                return;
            }
            request.status = status;
            request.last_error = Some(error.to_string());
            request.updated_at = Utc::now();
        }
    }
}

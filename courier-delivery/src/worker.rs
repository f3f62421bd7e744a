use std::sync::Arc;
use std::time::Duration;

use courier_common::{DeliveryStatus, Signal};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::dispatch::Dispatcher;
use crate::error::DeliveryError;
use crate::queue::DeliveryQueue;

/// Single consumer of the delivery queue.
///
/// Pulls request ids in arrival order and drives each through the status
/// machine. Shutdown is observed between pulls; an in-flight delivery
/// always runs to completion.
pub struct DeliveryWorker {
    queue: DeliveryQueue,
    rx: mpsc::Receiver<Ulid>,
    dispatcher: Arc<Dispatcher>,
    retry_interval: Duration,
}

impl DeliveryWorker {
    #[must_use]
    pub fn new(
        queue: DeliveryQueue,
        rx: mpsc::Receiver<Ulid>,
        dispatcher: Arc<Dispatcher>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            queue,
            rx,
            dispatcher,
            retry_interval,
        }
    }

    pub async fn serve(mut self, mut shutdown: broadcast::Receiver<Signal>) {
        info!("delivery worker started");
        loop {
            tokio::select! {
                item = self.rx.recv() => match item {
                    Some(id) => self.process(id).await,
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        info!("delivery worker stopped");
    }

    async fn process(&self, id: Ulid) {
        // Cancelled or unknown ids fall out of the channel without effect.
        let Some(request) = self.queue.begin_attempt(&id) else {
            debug!(%id, "skipping request no longer eligible for delivery");
            return;
        };

        debug!(%id, attempt = request.attempts, max = request.max_attempts, "delivering");

        match self
            .dispatcher
            .dispatch(&request.recipients, &request.content)
            .await
        {
            Ok(()) => {
                self.queue.set_status(&id, DeliveryStatus::Sent);
                info!(%id, attempts = request.attempts, "delivered");
            }
            Err(e) if !e.is_retryable() => {
                warn!(%id, error = %e, "delivery failed permanently");
                self.queue
                    .record_failure(&id, DeliveryStatus::Failed, &e.to_string());
            }
            Err(e) if request.attempts >= request.max_attempts => {
                warn!(%id, attempts = request.attempts, error = %e, "attempt ceiling reached");
                self.queue
                    .record_failure(&id, DeliveryStatus::Failed, &e.to_string());
            }
            Err(e) => {
                debug!(%id, error = %e, delay = ?self.retry_interval, "scheduling retry");
                self.queue
                    .record_failure(&id, DeliveryStatus::Retrying, &e.to_string());
                self.schedule_retry(id);
            }
        }
    }

    /// Re-submit the id after the fixed retry delay.
    ///
    /// The resubmission is non-blocking: a queue that is full at that
    /// moment fails the request rather than parking the timer task, and a
    /// closed queue abandons the retry.
    fn schedule_retry(&self, id: Ulid) {
        let queue = self.queue.clone();
        let delay = self.retry_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match queue.resubmit(id) {
                Ok(()) => {}
                Err(DeliveryError::QueueFull) => {
                    warn!(%id, "queue full at retry time, failing request");
                    queue.record_failure(&id, DeliveryStatus::Failed, "queue full at retry time");
                }
                Err(_) => {
                    debug!(%id, "queue closed, abandoning retry");
                }
            }
        });
    }
}

//! Service lifecycle and the public send surface.

use std::sync::Arc;

use courier_common::Signal;
use courier_delivery::{
    DeliveryError, DeliveryQueue, DeliveryRequest, DeliveryWorker, Dispatcher, RequestContent,
};
use courier_pool::Pool;
use courier_template::{Template, TemplateError, TemplateRegistry, TemplateVars};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use ulid::Ulid;

use crate::builtin;
use crate::config::{Config, ConfigError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service is already running")]
    AlreadyRunning,

    #[error("service is not running")]
    NotRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Everything that exists only while the service runs.
struct Running {
    pool: Arc<Pool>,
    dispatcher: Arc<Dispatcher>,
    queue: DeliveryQueue,
    shutdown: broadcast::Sender<Signal>,
    worker: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

/// Notification delivery service.
///
/// `start` wires the pool, template registry, queue, worker, and sweeper
/// together; `stop` tears them down in order. Both are safe to call from
/// any task; a second `start` while running is an error and a second
/// `stop` is a no-op.
pub struct Service {
    config: Config,
    running: Mutex<Option<Running>>,
}

impl Service {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }
        self.config.validate()?;

        let pool = Arc::new(Pool::new(self.config.pool_config()));
        let templates = Arc::new(TemplateRegistry::new(self.config.default_language.clone()));
        builtin::register_builtins(&templates)?;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&pool),
            templates,
            self.config.dispatch_config(),
        ));

        let (queue, rx) = DeliveryQueue::bounded(
            self.config.queue.capacity,
            self.config.queue.max_attempts,
        );
        let (shutdown, worker_rx) = broadcast::channel(1);
        let sweeper_rx = shutdown.subscribe();

        let worker = DeliveryWorker::new(
            queue.clone(),
            rx,
            Arc::clone(&dispatcher),
            self.config.retry_interval(),
        );
        let worker = tokio::spawn(worker.serve(worker_rx));

        let sweep_pool = Arc::clone(&pool);
        let sweeper = tokio::spawn(async move { sweep_pool.sweep(sweeper_rx).await });

        info!(relay = %self.config.relay.address, "service started");
        *running = Some(Running {
            pool,
            dispatcher,
            queue,
            shutdown,
            worker,
            sweeper,
        });
        Ok(())
    }

    /// Stop the service: close the enqueue path, let the worker finish its
    /// in-flight delivery, and shut the pool down. Idempotent.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        info!("stopping service");

        let _ = running.shutdown.send(Signal::Shutdown);
        // Dropping the queue closes the channel once timer tasks finish.
        drop(running.queue);

        if let Err(e) = running.worker.await {
            warn!(error = %e, "worker task did not complete cleanly");
        }
        if let Err(e) = running.sweeper.await {
            warn!(error = %e, "sweeper task did not complete cleanly");
        }

        running.pool.shutdown().await;
        info!("service stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Running and able to hand out connections.
    #[must_use]
    pub fn health(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| r.pool.is_open())
    }

    /// Queue a request for asynchronous delivery.
    pub fn enqueue(&self, request: DeliveryRequest) -> Result<Ulid, ServiceError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;
        Ok(running.queue.enqueue(request)?)
    }

    /// Send literal content immediately, bypassing the queue and retry.
    pub async fn send_now(
        &self,
        recipients: Vec<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
    ) -> Result<(), ServiceError> {
        let dispatcher = self.dispatcher()?;
        let content = RequestContent::Direct {
            subject: subject.into(),
            text: text.into(),
            html,
        };
        Ok(dispatcher.dispatch(&recipients, &content).await?)
    }

    /// Render a template and send immediately, bypassing the queue.
    pub async fn send_template(
        &self,
        name: impl Into<String>,
        recipients: Vec<String>,
        vars: TemplateVars,
    ) -> Result<(), ServiceError> {
        let dispatcher = self.dispatcher()?;
        let content = RequestContent::Template {
            name: name.into(),
            language: String::new(),
            vars,
        };
        Ok(dispatcher.dispatch(&recipients, &content).await?)
    }

    /// Register or override a template while running.
    pub fn register_template(&self, template: Template) -> Result<(), ServiceError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;
        Ok(running.dispatcher.templates().register(template)?)
    }

    /// Look up a tracked request.
    pub fn request(&self, id: &Ulid) -> Result<Option<DeliveryRequest>, ServiceError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;
        Ok(running.queue.get(id))
    }

    /// Snapshot of every tracked request.
    pub fn requests(&self) -> Result<Vec<DeliveryRequest>, ServiceError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;
        Ok(running.queue.all())
    }

    /// Cancel a queued request that has not reached a terminal status.
    pub fn cancel(&self, id: &Ulid) -> Result<bool, ServiceError> {
        let running = self.running.lock();
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;
        Ok(running.queue.cancel(id))
    }

    fn dispatcher(&self) -> Result<Arc<Dispatcher>, ServiceError> {
        self.running
            .lock()
            .as_ref()
            .map(|r| Arc::clone(&r.dispatcher))
            .ok_or(ServiceError::NotRunning)
    }
}

//! Bounded pool of live relay connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use courier_common::Signal;
use courier_smtp::{ClientError, SmtpClient};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::connection::{IdleSlot, PooledConnection};
use crate::error::{PoolError, Result};

/// Relay credentials for AUTH PLAIN.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Runtime configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Relay address as `host:port`.
    pub relay_addr: String,
    /// Hostname used for TLS certificate verification on STARTTLS.
    pub server_name: String,
    /// Domain announced in EHLO.
    pub helo_domain: String,
    /// Whether to upgrade the connection with STARTTLS before AUTH.
    pub starttls: bool,
    /// Optional AUTH PLAIN credentials.
    pub credentials: Option<Credentials>,
    /// Maximum number of connections checked out at once.
    pub capacity: usize,
    /// Idle connections older than this are retired.
    pub max_idle: Duration,
    /// Connections older than this are retired regardless of use.
    pub max_lifetime: Duration,
    /// Interval of the background validation sweep.
    pub sweep_interval: Duration,
    /// Deadline applied to connection establishment and liveness probes.
    pub op_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            relay_addr: "localhost:25".to_string(),
            server_name: "localhost".to_string(),
            helo_domain: "localhost".to_string(),
            starttls: false,
            credentials: None,
            capacity: 4,
            max_idle: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            op_timeout: Duration::from_secs(30),
        }
    }
}

/// A fixed-capacity pool of relay connections.
///
/// Capacity is enforced with a semaphore whose permits travel with checked
/// out connections; the idle set and closed flag are the only other shared
/// state. Checkout and the background sweep run the NOOP liveness probe;
/// checkin never performs network I/O.
pub struct Pool {
    config: PoolConfig,
    idle: Mutex<Vec<IdleSlot>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl Pool {
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.capacity));
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            permits,
            closed: AtomicBool::new(false),
        }
    }

    /// Whether the pool is accepting checkouts.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Number of idle connections currently parked.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Acquire a connection, reusing a validated idle one when possible.
    ///
    /// Blocks while the pool is at capacity until another caller returns a
    /// connection, and while establishing a new connection; both waits are
    /// bounded by the configured operation timeout.
    pub async fn checkout(&self) -> Result<PooledConnection> {
        if !self.is_open() {
            return Err(PoolError::Closed);
        }

        let permit = tokio::time::timeout(
            self.config.op_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            PoolError::Transport(ClientError::Timeout(format!(
                "pool at capacity for {:?}",
                self.config.op_timeout
            )))
        })?
        .map_err(|_| PoolError::Closed)?;

        // Shutdown may have raced the acquire.
        if !self.is_open() {
            return Err(PoolError::Closed);
        }

        // Prefer idle connections, retiring any that fail validation.
        while let Some(slot) = self.pop_idle() {
            if slot.is_expired(self.config.max_lifetime, self.config.max_idle) {
                debug!("retiring expired idle connection");
                Self::discard(slot.client);
                continue;
            }

            let mut client = slot.client;
            match tokio::time::timeout(self.config.op_timeout, client.noop()).await {
                Ok(Ok(_)) => {
                    return Ok(PooledConnection {
                        client,
                        created_at: slot.created_at,
                        _permit: permit,
                    });
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "idle connection failed liveness probe");
                }
                Err(_) => {
                    debug!("idle connection probe timed out");
                }
            }
        }

        let client = tokio::time::timeout(self.config.op_timeout, self.establish())
            .await
            .map_err(|_| {
                ClientError::Timeout(format!(
                    "connection establishment exceeded {:?}",
                    self.config.op_timeout
                ))
            })??;

        Ok(PooledConnection {
            client,
            created_at: Instant::now(),
            _permit: permit,
        })
    }

    /// Hand a connection back to the pool.
    ///
    /// Never blocks: only the expiry checks run here, the next liveness
    /// probe happens at checkout or in the sweep. The connection is
    /// discarded when the pool is closed, the connection has expired, or
    /// the idle set is full.
    pub fn checkin(&self, conn: PooledConnection) {
        if !self.is_open() {
            Self::discard(conn.client);
            return;
        }

        if conn.age() > self.config.max_lifetime {
            debug!(age = ?conn.age(), "discarding returned connection past max lifetime");
            Self::discard(conn.client);
            return;
        }

        let slot = IdleSlot {
            client: conn.client,
            created_at: conn.created_at,
            last_used: Instant::now(),
        };

        {
            let mut idle = self.idle.lock();
            if idle.len() >= self.config.capacity {
                drop(idle);
                debug!("idle set full, discarding returned connection");
                Self::discard(slot.client);
                return;
            }
            idle.push(slot);
        }
        // The permit held by `conn` drops here, after the connection is
        // parked, so a woken waiter always sees it in the idle set.
    }

    /// Shut the pool down: no further checkouts, all idle connections
    /// closed. Idempotent. Connections checked out at shutdown time are
    /// discarded on checkin.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.permits.close();

        let drained: Vec<IdleSlot> = std::mem::take(&mut *self.idle.lock());
        info!(connections = drained.len(), "shutting down connection pool");

        for slot in drained {
            let mut client = slot.client;
            match tokio::time::timeout(Duration::from_secs(5), client.quit()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "QUIT during pool shutdown failed"),
                Err(_) => debug!("QUIT during pool shutdown timed out"),
            }
        }
    }

    /// Background validation pass over idle connections.
    ///
    /// Runs until a shutdown signal arrives, retiring idle connections
    /// that fail expiry checks or the liveness probe on each tick.
    pub async fn sweep(&self, mut shutdown: tokio::sync::broadcast::Receiver<Signal>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let retired = self.sweep_once().await;
                    if retired > 0 {
                        debug!(retired, "sweep retired idle connections");
                    }
                }
                _ = shutdown.recv() => {
                    debug!("connection sweep stopping");
                    break;
                }
            }
        }
    }

    /// Validate every currently idle connection once, returning the number
    /// retired.
    pub async fn sweep_once(&self) -> usize {
        let candidates: Vec<IdleSlot> = std::mem::take(&mut *self.idle.lock());
        let mut retired = 0;

        for slot in candidates {
            if slot.is_expired(self.config.max_lifetime, self.config.max_idle) {
                Self::discard(slot.client);
                retired += 1;
                continue;
            }

            let mut client = slot.client;
            match tokio::time::timeout(self.config.op_timeout, client.noop()).await {
                Ok(Ok(_)) => {
                    let mut idle = self.idle.lock();
                    if self.is_open() && idle.len() < self.config.capacity {
                        idle.push(IdleSlot {
                            client,
                            created_at: slot.created_at,
                            last_used: slot.last_used,
                        });
                    } else {
                        drop(idle);
                        Self::discard(client);
                        retired += 1;
                    }
                }
                Ok(Err(_)) | Err(_) => {
                    retired += 1;
                }
            }
        }

        retired
    }

    fn pop_idle(&self) -> Option<IdleSlot> {
        self.idle.lock().pop()
    }

    /// Dial, greet, EHLO, optionally STARTTLS (with a second EHLO), and
    /// authenticate.
    async fn establish(&self) -> Result<SmtpClient> {
        let mut client =
            SmtpClient::connect(&self.config.relay_addr, self.config.server_name.clone()).await?;

        let greeting = client.read_greeting().await?;
        if !greeting.is_positive() {
            return Err(PoolError::Transport(greeting.into_error()));
        }

        let capabilities = client.ehlo(&self.config.helo_domain).await?;

        if self.config.starttls {
            if !capabilities.advertises("STARTTLS") {
                warn!(relay = %self.config.relay_addr, "relay does not advertise STARTTLS");
            }
            client.starttls().await?;
            client.ehlo(&self.config.helo_domain).await?;
        }

        if let Some(creds) = &self.config.credentials {
            client.auth_plain(&creds.username, &creds.password).await?;
        }

        debug!(relay = %self.config.relay_addr, "established relay connection");
        Ok(client)
    }

    /// Close a connection best-effort without blocking the caller.
    fn discard(mut client: SmtpClient) {
        // Failure to close is logged and never escalated.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match tokio::time::timeout(Duration::from_secs(5), client.quit()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!(error = %e, "QUIT on discarded connection failed"),
                    Err(_) => debug!("QUIT on discarded connection timed out"),
                }
            });
        }
    }
}

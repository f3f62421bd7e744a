//! Configurable in-process SMTP relay double for pool tests.
#![allow(dead_code)] // shared test utility, not every test uses every knob

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

#[derive(Clone)]
struct RelayConfig {
    greeting: (u16, String),
    ehlo_code: u16,
    noop_code: u16,
    auth_code: u16,
    drop_after_commands: Option<usize>,
    hang_on_command: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            greeting: (220, "mock relay ready".to_string()),
            ehlo_code: 250,
            noop_code: 250,
            auth_code: 235,
            drop_after_commands: None,
            hang_on_command: None,
        }
    }
}

/// Mock relay listening on an ephemeral port.
pub struct MockRelay {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    commands: Arc<RwLock<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockRelay {
    #[must_use]
    pub fn builder() -> MockRelayBuilder {
        MockRelayBuilder {
            config: RelayConfig::default(),
        }
    }

    /// Start a relay that answers everything positively.
    pub async fn start() -> std::io::Result<Self> {
        Self::builder().build().await
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    /// Total TCP connections accepted so far.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Every command line received, across all connections.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle(
        mut stream: TcpStream,
        config: Arc<RelayConfig>,
        commands: Arc<RwLock<Vec<String>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut seen = 0usize;

        let (code, message) = &config.greeting;
        writer
            .write_all(format!("{code} {message}\r\n").as_bytes())
            .await?;
        writer.flush().await?;

        loop {
            if let Some(limit) = config.drop_after_commands
                && seen >= limit
            {
                return Ok(());
            }
            if let Some(n) = config.hang_on_command
                && seen == n
            {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }

            line.clear();
            let Ok(Ok(n)) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if n == 0 {
                return Ok(());
            }
            seen += 1;

            let cmd = line.trim().to_string();
            commands.write().await.push(cmd.clone());

            let verb = cmd
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_uppercase();
            let reply = match verb.as_str() {
                "EHLO" => format!(
                    "{code}-mock relay\r\n{code} PIPELINING\r\n",
                    code = config.ehlo_code
                ),
                "NOOP" => format!("{} ok\r\n", config.noop_code),
                "AUTH" => format!("{} authenticated\r\n", config.auth_code),
                "QUIT" => {
                    writer.write_all(b"221 bye\r\n").await?;
                    writer.flush().await?;
                    return Ok(());
                }
                _ => "250 ok\r\n".to_string(),
            };
            writer.write_all(reply.as_bytes()).await?;
            writer.flush().await?;
        }
    }
}

pub struct MockRelayBuilder {
    config: RelayConfig,
}

impl MockRelayBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = (code, message.into());
        self
    }

    #[must_use]
    pub const fn with_noop_code(mut self, code: u16) -> Self {
        self.config.noop_code = code;
        self
    }

    #[must_use]
    pub const fn with_auth_code(mut self, code: u16) -> Self {
        self.config.auth_code = code;
        self
    }

    /// Close each connection silently after N commands.
    #[must_use]
    pub const fn with_drop_after_commands(mut self, count: usize) -> Self {
        self.config.drop_after_commands = Some(count);
        self
    }

    /// Hang on the Nth command of each connection (0-indexed).
    #[must_use]
    pub const fn with_hang_on_command(mut self, index: usize) -> Self {
        self.config.hang_on_command = Some(index);
        self
    }

    pub async fn build(self) -> std::io::Result<MockRelay> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_config = Arc::clone(&config);
        let accept_connections = Arc::clone(&connections);
        let accept_commands = Arc::clone(&commands);
        let accept_shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if accept_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;
                if let Ok(Ok((stream, _peer))) = accepted {
                    accept_connections.fetch_add(1, Ordering::Relaxed);
                    let config = Arc::clone(&accept_config);
                    let commands = Arc::clone(&accept_commands);
                    tokio::spawn(async move {
                        let _ = MockRelay::handle(stream, config, commands).await;
                    });
                }
            }
        });

        Ok(MockRelay {
            addr,
            connections,
            commands,
            shutdown,
        })
    }
}

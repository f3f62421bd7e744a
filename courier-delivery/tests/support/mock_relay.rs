//! Mock SMTP relay speaking the full transaction, with failure injection.
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
    mail_code: u16,
    rcpt_code: u16,
    data_end_code: u16,
    hang_on_mail_attempt: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mail_code: 250,
            rcpt_code: 250,
            data_end_code: 250,
            hang_on_mail_attempt: None,
        }
    }
}

/// In-process relay that accepts or rejects deliveries as configured.
pub struct MockRelay {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<String>>>,
    messages: Arc<RwLock<Vec<String>>>,
    mail_attempts: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl MockRelay {
    #[must_use]
    pub fn builder() -> MockRelayBuilder {
        MockRelayBuilder {
            config: RelayConfig::default(),
        }
    }

    pub async fn start() -> std::io::Result<Self> {
        Self::builder().build().await
    }

    #[must_use]
    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    /// Every command line received, across all connections.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    /// Complete message payloads accepted after DATA.
    pub async fn messages(&self) -> Vec<String> {
        self.messages.read().await.clone()
    }

    /// Number of MAIL FROM commands seen, i.e. transaction attempts.
    #[must_use]
    pub fn mail_attempts(&self) -> usize {
        self.mail_attempts.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle(
        mut stream: TcpStream,
        config: Arc<RelayConfig>,
        commands: Arc<RwLock<Vec<String>>>,
        messages: Arc<RwLock<Vec<String>>>,
        mail_attempts: Arc<AtomicUsize>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(b"220 mock relay ready\r\n").await?;
        writer.flush().await?;

        loop {
            line.clear();
            let Ok(Ok(n)) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if n == 0 {
                return Ok(());
            }

            let cmd = line.trim().to_string();
            commands.write().await.push(cmd.clone());

            let verb = cmd
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_uppercase();
            let reply = match verb.as_str() {
                "EHLO" => "250-mock relay\r\n250 PIPELINING\r\n".to_string(),
                "NOOP" => "250 ok\r\n".to_string(),
                "AUTH" => "235 authenticated\r\n".to_string(),
                "MAIL" => {
                    let attempt = mail_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    if config.hang_on_mail_attempt == Some(attempt) {
                        // Park without replying to keep the client waiting.
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        return Ok(());
                    }
                    format!("{} ok\r\n", config.mail_code)
                }
                "RCPT" => format!("{} ok\r\n", config.rcpt_code),
                "DATA" => {
                    writer.write_all(b"354 go ahead\r\n").await?;
                    writer.flush().await?;

                    let mut payload = String::new();
                    loop {
                        line.clear();
                        let n = reader.read_line(&mut line).await?;
                        if n == 0 {
                            return Ok(());
                        }
                        if line.trim_end() == "." {
                            break;
                        }
                        payload.push_str(&line);
                    }
                    messages.write().await.push(payload);
                    format!("{} accepted\r\n", config.data_end_code)
                }
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
    /// Code returned to MAIL FROM (451 to inject a transient failure).
    #[must_use]
    pub const fn with_mail_code(mut self, code: u16) -> Self {
        self.config.mail_code = code;
        self
    }

    #[must_use]
    pub const fn with_rcpt_code(mut self, code: u16) -> Self {
        self.config.rcpt_code = code;
        self
    }

    /// Code returned after the end-of-data marker.
    #[must_use]
    pub const fn with_data_end_code(mut self, code: u16) -> Self {
        self.config.data_end_code = code;
        self
    }

    /// Stop replying on the Nth MAIL FROM (counted across connections),
    /// stalling that transaction until the client times out.
    #[must_use]
    pub const fn with_hang_on_mail_attempt(mut self, attempt: usize) -> Self {
        self.config.hang_on_mail_attempt = Some(attempt);
        self
    }

    pub async fn build(self) -> std::io::Result<MockRelay> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let messages = Arc::new(RwLock::new(Vec::new()));
        let mail_attempts = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_config = Arc::clone(&config);
        let accept_commands = Arc::clone(&commands);
        let accept_messages = Arc::clone(&messages);
        let accept_attempts = Arc::clone(&mail_attempts);
        let accept_shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if accept_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;
                if let Ok(Ok((stream, _peer))) = accepted {
                    let config = Arc::clone(&accept_config);
                    let commands = Arc::clone(&accept_commands);
                    let messages = Arc::clone(&accept_messages);
                    let attempts = Arc::clone(&accept_attempts);
                    tokio::spawn(async move {
                        let _ =
                            MockRelay::handle(stream, config, commands, messages, attempts).await;
                    });
                }
            }
        });

        Ok(MockRelay {
            addr,
            commands,
            messages,
            mail_attempts,
            shutdown,
        })
    }
}

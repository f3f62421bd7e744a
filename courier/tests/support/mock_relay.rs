//! Minimal accept-everything SMTP relay for service tests.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

pub struct MockRelay {
    addr: SocketAddr,
    messages: Arc<RwLock<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockRelay {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let messages = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_messages = Arc::clone(&messages);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                if accept_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;
                if let Ok(Ok((stream, _peer))) = accepted {
                    let messages = Arc::clone(&accept_messages);
                    tokio::spawn(async move {
                        let _ = Self::handle(stream, messages).await;
                    });
                }
            }
        });

        Ok(Self {
            addr,
            messages,
            shutdown,
        })
    }

    #[must_use]
    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    /// Message payloads accepted after DATA.
    pub async fn messages(&self) -> Vec<String> {
        self.messages.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle(
        mut stream: TcpStream,
        messages: Arc<RwLock<Vec<String>>>,
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

            let verb = line
                .trim()
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_uppercase();
            match verb.as_str() {
                "EHLO" => {
                    writer
                        .write_all(b"250-mock relay\r\n250 PIPELINING\r\n")
                        .await?;
                }
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
                    writer.write_all(b"250 accepted\r\n").await?;
                }
                "QUIT" => {
                    writer.write_all(b"221 bye\r\n").await?;
                    writer.flush().await?;
                    return Ok(());
                }
                _ => {
                    writer.write_all(b"250 ok\r\n").await?;
                }
            }
            writer.flush().await?;
        }
    }
}

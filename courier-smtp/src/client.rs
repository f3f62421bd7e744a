//! SMTP client with STARTTLS and AUTH PLAIN support.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{ClientError, Result};
use crate::response::Reply;

/// Initial read buffer capacity for replies.
const READ_CHUNK: usize = 4096;

/// Cap on buffered reply bytes (a reply larger than this is malformed).
const MAX_REPLY_SIZE: usize = 1024 * 1024;

/// A relay connection, either plain TCP or upgraded to TLS.
#[derive(Debug)]
enum Stream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Stream {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(s) => s.write_all(data).await?,
            Self::Tls(s) => s.write_all(data).await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(s) => s.read(buf).await?,
            Self::Tls(s) => s.read(buf).await?,
        };
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(n)
    }

    async fn upgrade(self, server_name: &str) -> Result<Self> {
        let Self::Plain(stream) = self else {
            return Err(ClientError::Tls("connection is already TLS".into()));
        };

        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            roots
                .add(cert)
                .map_err(|e| ClientError::Tls(format!("failed to add root certificate: {e}")))?;
        }
        if !native.errors.is_empty() {
            tracing::warn!(errors = ?native.errors, "some system certificates could not be loaded");
        }

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| ClientError::Tls(format!("invalid server name {server_name:?}: {e}")))?;

        let tls = TlsConnector::from(Arc::new(config))
            .connect(name, stream)
            .await
            .map_err(|e| ClientError::Tls(e.to_string()))?;

        Ok(Self::Tls(Box::new(tls)))
    }
}

/// An SMTP client conversation with the configured relay.
///
/// The caller drives the protocol explicitly: `connect`, `read_greeting`,
/// `ehlo`, optionally `starttls` (followed by a second `ehlo`) and
/// `auth_plain`, then one or more mail transactions.
#[derive(Debug)]
pub struct SmtpClient {
    stream: Option<Stream>,
    buffer: Vec<u8>,
    server_name: String,
}

impl SmtpClient {
    /// Establish a TCP connection to `addr` (host:port).
    ///
    /// `server_name` is the hostname used for TLS certificate verification
    /// when the connection is later upgraded via STARTTLS.
    pub async fn connect(addr: &str, server_name: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream: Some(Stream::Plain(stream)),
            buffer: Vec::with_capacity(READ_CHUNK),
            server_name: server_name.into(),
        })
    }

    /// Read the 220 greeting sent by the relay on connect.
    pub async fn read_greeting(&mut self) -> Result<Reply> {
        self.read_reply().await
    }

    /// Send a raw command line and read the reply.
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
        stream.write_all(format!("{command}\r\n").as_bytes()).await?;
        self.read_reply().await
    }

    /// EHLO handshake; returns the capability reply.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Reply> {
        let reply = self.command(&format!("EHLO {domain}")).await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// Upgrade the connection to TLS via STARTTLS.
    ///
    /// The caller must send a fresh EHLO afterwards (RFC 3207).
    pub async fn starttls(&mut self) -> Result<()> {
        let reply = self.command("STARTTLS").await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }

        let stream = self.stream.take().ok_or(ClientError::ConnectionClosed)?;
        let server_name = self.server_name.clone();
        self.stream = Some(stream.upgrade(&server_name).await?);
        // Any pipelined plaintext left in the buffer is void after upgrade.
        self.buffer.clear();
        Ok(())
    }

    /// Authenticate with AUTH PLAIN (RFC 4616 single-line form).
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let token = BASE64.encode(format!("\0{username}\0{password}"));
        let reply = self.command(&format!("AUTH PLAIN {token}")).await?;
        if reply.code != 235 {
            return Err(ClientError::AuthRejected {
                code: reply.code,
                message: reply.message(),
            });
        }
        Ok(())
    }

    /// MAIL FROM; errors on any non-2xx reply.
    pub async fn mail_from(&mut self, sender: &str) -> Result<Reply> {
        let reply = self.command(&format!("MAIL FROM:<{sender}>")).await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// RCPT TO; errors on any non-2xx reply.
    pub async fn rcpt_to(&mut self, recipient: &str) -> Result<Reply> {
        let reply = self.command(&format!("RCPT TO:<{recipient}>")).await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// DATA; expects the 354 intermediate reply.
    pub async fn data(&mut self) -> Result<Reply> {
        let reply = self.command("DATA").await?;
        if !reply.is_intermediate() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// Transmit the message payload followed by the end-of-data marker.
    ///
    /// Lines are normalized to CRLF and dot-stuffed (RFC 5321 §4.5.2).
    pub async fn send_payload(&mut self, payload: &str) -> Result<Reply> {
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let mut wire = String::with_capacity(payload.len() + 8);
        let mut lines = payload.split('\n').peekable();
        while let Some(line) = lines.next() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            // A trailing newline in the payload yields one empty final
            // segment, which is not a line of its own.
            if line.is_empty() && lines.peek().is_none() {
                break;
            }
            if line.starts_with('.') {
                wire.push('.');
            }
            wire.push_str(line);
            wire.push_str("\r\n");
        }
        wire.push_str(".\r\n");

        stream.write_all(wire.as_bytes()).await?;

        let reply = self.read_reply().await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// NOOP liveness probe.
    pub async fn noop(&mut self) -> Result<Reply> {
        let reply = self.command("NOOP").await?;
        if !reply.is_positive() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }

    /// RSET the current transaction.
    pub async fn rset(&mut self) -> Result<Reply> {
        self.command("RSET").await
    }

    /// QUIT and let the relay close the connection.
    pub async fn quit(&mut self) -> Result<Reply> {
        self.command("QUIT").await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some((reply, consumed)) = Reply::parse(&self.buffer)? {
                self.buffer.drain(..consumed);
                return Ok(reply);
            }

            if self.buffer.len() >= MAX_REPLY_SIZE {
                return Err(ClientError::Parse(format!(
                    "reply exceeds {MAX_REPLY_SIZE} bytes"
                )));
            }

            let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
            let mut chunk = [0u8; READ_CHUNK];
            let n = stream.read(&mut chunk).await?;
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

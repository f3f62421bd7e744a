use std::sync::Arc;
use std::time::Duration;

use courier_pool::{Pool, PooledConnection};
use courier_smtp::ClientError;
use courier_template::{RenderedContent, TemplateRegistry};
use tracing::debug;

use crate::error::Result;
use crate::message;
use crate::request::RequestContent;

/// Deadline for the RSET that tries to salvage a rejected connection.
const RSET_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Envelope sender and From header address.
    pub sender: String,
    /// Deadline applied to the whole SMTP transaction.
    pub op_timeout: Duration,
    /// Language used when a template request leaves it unspecified.
    pub default_language: String,
}

/// Sends one message over a pooled connection.
///
/// Shared by the queue worker and the synchronous send paths, so both
/// resolve templates, assemble, and transmit identically.
pub struct Dispatcher {
    pool: Arc<Pool>,
    templates: Arc<TemplateRegistry>,
    config: DispatchConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(pool: Arc<Pool>, templates: Arc<TemplateRegistry>, config: DispatchConfig) -> Self {
        Self {
            pool,
            templates,
            config,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Resolve the request's content to rendered form.
    pub fn resolve(&self, content: &RequestContent) -> Result<RenderedContent> {
        match content {
            RequestContent::Direct {
                subject,
                text,
                html,
            } => Ok(RenderedContent {
                subject: subject.clone(),
                text: text.clone(),
                html: html.clone(),
            }),
            RequestContent::Template {
                name,
                language,
                vars,
            } => {
                let language = if language.is_empty() {
                    &self.config.default_language
                } else {
                    language
                };
                Ok(self.templates.render(name, language, vars)?)
            }
        }
    }

    /// Render, check out a connection, and run the SMTP transaction.
    ///
    /// A connection that completes the transaction goes back to the pool.
    /// After a rejected command the relay is still in conversation, so the
    /// connection is reset and returned too; an IO failure or timeout
    /// leaves the protocol state unknown and the connection is dropped.
    pub async fn dispatch(&self, recipients: &[String], content: &RequestContent) -> Result<()> {
        let rendered = self.resolve(content)?;
        let payload = message::assemble(&self.config.sender, recipients, &rendered);

        let mut conn = self.pool.checkout().await?;

        let transaction = async {
            conn.mail_from(&self.config.sender).await?;
            for recipient in recipients {
                conn.rcpt_to(recipient).await?;
            }
            conn.data().await?;
            conn.send_payload(&payload).await?;
            Ok::<(), ClientError>(())
        };

        match tokio::time::timeout(self.config.op_timeout, transaction).await {
            Ok(Ok(())) => {
                self.pool.checkin(conn);
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "transaction failed");
                self.salvage(conn, &e).await;
                Err(e.into())
            }
            Err(_) => {
                debug!("transaction deadline exceeded, dropping connection");
                drop(conn);
                Err(ClientError::Timeout(format!(
                    "transmit exceeded {:?}",
                    self.config.op_timeout
                ))
                .into())
            }
        }
    }

    /// Reset a connection whose last command was rejected and park it for
    /// reuse. Only an SMTP rejection qualifies; any other failure means the
    /// stream can no longer be trusted and the connection is dropped.
    async fn salvage(&self, mut conn: PooledConnection, error: &ClientError) {
        if !matches!(error, ClientError::Smtp { .. }) {
            return;
        }
        match tokio::time::timeout(RSET_TIMEOUT, conn.rset()).await {
            Ok(Ok(reply)) if reply.is_positive() => self.pool.checkin(conn),
            _ => debug!("RSET after rejected command failed, dropping connection"),
        }
    }
}

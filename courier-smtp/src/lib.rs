//! SMTP relay client used by the courier delivery engine.
//!
//! This crate speaks just enough client-side SMTP to converse with a
//! configured relay: connect, greeting, EHLO, STARTTLS upgrade, AUTH PLAIN,
//! and the MAIL/RCPT/DATA transaction. It does not implement a server.

mod client;
mod error;
mod response;

pub use client::SmtpClient;
pub use error::{ClientError, Result};
pub use response::Reply;

//! Asynchronous notification delivery service.
//!
//! Wires a bounded SMTP connection pool, a template registry, and a
//! queued delivery worker into one service with synchronous and
//! fire-and-forget send paths.

pub mod builtin;
pub mod config;
pub mod service;

pub use config::{Config, ConfigError};
pub use service::{Service, ServiceError};

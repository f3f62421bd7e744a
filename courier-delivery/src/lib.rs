//! Delivery queue, worker, and message assembly.
//!
//! Requests enter through [`DeliveryQueue::enqueue`] and are consumed by a
//! single [`DeliveryWorker`], which renders content, checks a connection
//! out of the pool, and runs the SMTP transaction. Transient failures are
//! retried on a fixed interval up to the request's attempt ceiling.

mod dispatch;
mod error;
pub mod message;
mod queue;
mod request;
mod worker;

pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{DeliveryError, Result};
pub use queue::DeliveryQueue;
pub use request::{DeliveryRequest, RequestContent};
pub use worker::DeliveryWorker;

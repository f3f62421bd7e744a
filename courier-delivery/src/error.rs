use courier_pool::PoolError;
use courier_smtp::ClientError;
use courier_template::TemplateError;
use thiserror::Error;

/// Failures on the delivery path.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The bounded queue is at capacity; the request was not accepted.
    #[error("delivery queue is full")]
    QueueFull,

    /// The queue no longer accepts requests.
    #[error("delivery queue is shut down")]
    Shutdown,

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("transmit failed: {0}")]
    Transport(#[from] ClientError),
}

impl DeliveryError {
    /// Whether the worker should spend retry budget on this failure.
    ///
    /// Template failures and a closed pool fail the same way on every
    /// attempt, so they fail the request immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Pool(PoolError::Transport(_)) => true,
            Self::QueueFull | Self::Shutdown | Self::Pool(PoolError::Closed) | Self::Template(_) => {
                false
            }
        }
    }
}

pub type Result<T, E = DeliveryError> = std::result::Result<T, E>;

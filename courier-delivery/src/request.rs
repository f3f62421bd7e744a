use chrono::{DateTime, Utc};
use courier_common::{DeliveryStatus, Priority};
use courier_template::TemplateVars;
use ulid::Ulid;

/// What a request wants sent: literal content, or a template reference
/// rendered at delivery time.
#[derive(Debug, Clone)]
pub enum RequestContent {
    Direct {
        subject: String,
        text: String,
        html: Option<String>,
    },
    Template {
        name: String,
        /// Empty means the configured default language.
        language: String,
        vars: TemplateVars,
    },
}

/// A single notification to deliver, tracked in the ledger for its whole
/// lifetime.
///
/// Status machine: `pending → sending → {sent | retrying → sending |
/// failed}`, with `cancelled` reachable only through [`cancel`] while the
/// request is not yet terminal.
///
/// [`cancel`]: crate::DeliveryQueue::cancel
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub id: Ulid,
    pub recipients: Vec<String>,
    pub content: RequestContent,
    /// Advisory only; the worker consumes requests in arrival order.
    pub priority: Priority,
    /// Number of sending passes so far.
    pub attempts: u32,
    /// Zero means the queue's configured default applies at enqueue.
    pub max_attempts: u32,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl DeliveryRequest {
    fn new(recipients: Vec<String>, content: RequestContent) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new(),
            recipients,
            content,
            priority: Priority::default(),
            attempts: 0,
            max_attempts: 0,
            status: DeliveryStatus::Pending,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// A request carrying its content literally.
    #[must_use]
    pub fn direct(
        recipients: Vec<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
    ) -> Self {
        Self::new(
            recipients,
            RequestContent::Direct {
                subject: subject.into(),
                text: text.into(),
                html,
            },
        )
    }

    /// A request rendered from a registered template at delivery time.
    #[must_use]
    pub fn templated(
        recipients: Vec<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        vars: TemplateVars,
    ) -> Self {
        Self::new(
            recipients,
            RequestContent::Template {
                name: name.into(),
                language: language.into(),
                vars,
            },
        )
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

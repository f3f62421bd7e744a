use serde::{Deserialize, Serialize};

/// A named, language-tagged message template.
///
/// Bodies use `{{key}}` handlebars placeholders. Templates are identified
/// by the `(name, language)` pair; registering the same pair again replaces
/// the stored template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub language: String,
    pub subject: String,
    pub text: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Template {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
            active: true,
        }
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// The fully rendered pieces of a message, ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

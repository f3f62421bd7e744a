use thiserror::Error;

/// Failures raised by the template registry and renderer.
///
/// All variants are permanent: a request that fails here will fail the same
/// way on every retry, so callers fail the delivery immediately instead of
/// spending retry budget.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template name must not be empty")]
    MissingName,

    #[error("no template named {name:?} for language {language:?}")]
    NotFound { name: String, language: String },

    #[error("template {name:?} for language {language:?} is inactive")]
    Inactive { name: String, language: String },

    #[error("template syntax error: {0}")]
    Syntax(String),
}

pub type Result<T, E = TemplateError> = std::result::Result<T, E>;

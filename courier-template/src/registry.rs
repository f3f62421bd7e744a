use std::collections::HashMap;

use handlebars::Handlebars;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, TemplateError};
use crate::template::{RenderedContent, Template};
use crate::value::TemplateVars;

/// Concurrent store of templates with a handlebars renderer.
///
/// Rendering is non-strict: placeholders with no matching variable render
/// as the empty string. Rendering never mutates the stored template, so
/// repeated renders with the same variables produce identical output.
pub struct TemplateRegistry {
    default_language: String,
    engine: Handlebars<'static>,
    templates: RwLock<HashMap<(String, String), Template>>,
}

impl TemplateRegistry {
    #[must_use]
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            engine: Handlebars::new(),
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Store a template under its `(name, language)` key, replacing any
    /// previous registration. An empty language falls back to the
    /// registry's default language.
    pub fn register(&self, mut template: Template) -> Result<()> {
        if template.name.is_empty() {
            return Err(TemplateError::MissingName);
        }
        if template.language.is_empty() {
            template.language = self.default_language.clone();
        }

        let key = (template.name.clone(), template.language.clone());
        debug!(name = %key.0, language = %key.1, "registering template");
        self.templates.write().insert(key, template);
        Ok(())
    }

    /// Look up a template by exact `(name, language)` key.
    ///
    /// There is no language fallback: a template registered under `en` is
    /// `NotFound` when requested as `fr`.
    pub fn resolve(&self, name: &str, language: &str) -> Result<Template> {
        let language = if language.is_empty() {
            &self.default_language
        } else {
            language
        };

        let templates = self.templates.read();
        let template = templates
            .get(&(name.to_string(), language.to_string()))
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
                language: language.to_string(),
            })?;

        if !template.active {
            return Err(TemplateError::Inactive {
                name: name.to_string(),
                language: language.to_string(),
            });
        }

        Ok(template.clone())
    }

    /// Render a single template string against the given variables.
    pub fn render_str(&self, text: &str, vars: &TemplateVars) -> Result<String> {
        self.engine
            .render_template(text, vars)
            .map_err(|e| TemplateError::Syntax(e.to_string()))
    }

    /// Resolve a template and render its subject and bodies.
    pub fn render(&self, name: &str, language: &str, vars: &TemplateVars) -> Result<RenderedContent> {
        let template = self.resolve(name, language)?;

        let subject = self.render_str(&template.subject, vars)?;
        let text = self.render_str(&template.text, vars)?;
        let html = match &template.html {
            Some(html) => Some(self.render_str(html, vars)?),
            None => None,
        };

        Ok(RenderedContent {
            subject,
            text,
            html,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

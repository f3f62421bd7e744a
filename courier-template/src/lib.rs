//! Named, language-tagged message templates rendered with handlebars.

mod error;
mod registry;
mod template;
mod value;

pub use error::{Result, TemplateError};
pub use registry::TemplateRegistry;
pub use template::{RenderedContent, Template};
pub use value::{TemplateValue, TemplateVars};

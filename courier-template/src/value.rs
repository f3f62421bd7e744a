use std::collections::HashMap;

use serde::Serialize;

/// A value substitutable into a template placeholder.
///
/// A closed set of renderable kinds rather than arbitrary dynamic values,
/// so every variable a caller hands over has a defined rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplateValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Map(HashMap<String, TemplateValue>),
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Variables passed to a render call, keyed by placeholder name.
pub type TemplateVars = HashMap<String, TemplateValue>;

//! Location description templates.
//!
//! Descriptions are Jinja templates rendered with `minijinja`, so a GM can vary
//! the text a character sees on arrival. Two variables are visible:
//!
//! - `character_name`, the viewing character
//! - `flag`, a map of the character's flag traits (`{{ flag.door }}`)
//!
//! Unknown variables render as empty text and are falsy in conditions.
//! Output is never HTML-escaped.

use std::collections::BTreeMap;

use minijinja::{context, AutoEscape, Environment};

use crate::error::DomainError;

/// Variables visible to a location description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub character_name: String,
    pub flags: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new(character_name: impl Into<String>, flags: BTreeMap<String, String>) -> Self {
        Self {
            character_name: character_name.into(),
            flags,
        }
    }
}

/// Renders `source` against `context`.
pub fn render_template(source: &str, context: &TemplateContext) -> Result<String, DomainError> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.render_str(
        source,
        context! {
            character_name => &context.character_name,
            flag => &context.flags,
        },
    )
    .map_err(|e| DomainError::template(e.to_string()))
}

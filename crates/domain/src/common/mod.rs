//! Common utilities shared by the domain and engine.

mod datetime;
mod string;
pub mod template;

pub use datetime::{format_remaining, natural_delta, parse_datetime};
pub use string::fuzzy_search;
pub use template::{render_template, TemplateContext};

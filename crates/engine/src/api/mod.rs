//! API layer - chat and HTTP entry points.

pub mod chat;
pub mod http;

pub use chat::Dispatcher;
pub use http::{routes, WebState};

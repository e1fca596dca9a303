//! Response production — cache, canned templates, AI generation.

pub mod generator;
pub mod model;
pub mod templates;

pub use generator::{GeneratedResponse, ResponseGenerator, ResponseSource};
pub use model::{AiResponse, ResponseCacheEntry, ResponseType, SentResponse};
pub use templates::TemplateStore;

// Public modules
pub mod aggregator;
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod store;
pub mod types;

// Re-exports
pub use aggregator::{Aggregate, Aggregator, StreamItem, aggregate};
pub use client::{API_KEY_ENV, Completions, Groq};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{BufferRenderer, PlainTextRenderer, RenderEvent, Renderer};
pub use store::{ConversationRecord, RecordStore};
pub use types::*;

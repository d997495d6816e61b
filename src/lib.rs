// Library interface for pagechat

pub mod cache;
pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod rag;
pub mod session;
pub mod settings;
pub mod text;

// Re-export commonly used types
pub use config::{Config, RagConfig};
pub use error::{PageChatError, Result};
pub use session::{PageEvent, PageSession};

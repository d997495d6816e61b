use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageChatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API key not found. Please set your Gemini API key in the extension options.")]
    MissingApiKey,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("{0}")]
    Completion(String),

    #[error("No content chunks available for this page")]
    NoChunks,

    #[error("Page content has not been extracted yet")]
    NoPageContent,

    #[error("Config error: {0}")]
    Config(String),
}

impl PageChatError {
    /// Cancellation means the work was abandoned, not that it failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PageChatError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PageChatError>;

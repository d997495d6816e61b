pub mod page;
pub mod settings;

use std::path::Path;
use std::sync::Arc;

use pagechat::config::Config;
use pagechat::embeddings::{EmbeddingService, GeminiEmbedding, HashingEmbedding};
use pagechat::error::{PageChatError, Result};
use pagechat::extractor::html::HtmlDocument;

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PageChatError::Config(format!("tokio runtime: {}", e)))
}

fn load_document(file: &Path, url: Option<&str>) -> Result<HtmlDocument> {
    let source = std::fs::read_to_string(file)?;
    let url = match url {
        Some(url) => url.to_string(),
        None => format!("file://{}", file.canonicalize()?.display()),
    };
    Ok(HtmlDocument::parse(url, &source))
}

/// Gemini unless `offline`; Gemini needs a key before anything is sent
fn embedder(config: &Config, offline: bool) -> Result<Arc<dyn EmbeddingService>> {
    if offline {
        Ok(Arc::new(HashingEmbedding::new(config.rag.embedding_dim)))
    } else {
        Ok(Arc::new(GeminiEmbedding::from_config(config)?))
    }
}

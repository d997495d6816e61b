use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::Deserialize;

use super::Embedding;
use crate::config::Config;
use crate::error::{PageChatError, Result};

/// Remote (or local) text -> vector backend.
///
/// Implementations report failures as errors; the `EmbeddingClient` layered on
/// top turns those into zero vectors and owns timeouts and cancellation.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Gemini `embedContent` backend
pub struct GeminiEmbedding {
    api_key: String,
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiEmbedding {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Errors with `MissingApiKey` before any request is attempted.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.require_api_key()?;
        Ok(Self::new(key, config.endpoint.clone(), config.embed_model.clone()))
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        #[derive(Deserialize)]
        struct EmbedResponse {
            embedding: EmbeddingValues,
        }

        #[derive(Deserialize)]
        struct EmbeddingValues {
            values: Vec<f32>,
        }

        let url = format!("{}/models/{}:embedContent", self.endpoint, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&serde_json::json!({
                "model": format!("models/{}", self.model),
                "content": {
                    "parts": [{ "text": text }]
                }
            }))
            .send()
            .await
            .map_err(redact)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PageChatError::Embedding(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response.json().await.map_err(redact)?;
        if result.embedding.values.is_empty() {
            return Err(PageChatError::Embedding(
                "Invalid Gemini embedding response".into(),
            ));
        }
        Ok(result.embedding.values)
    }
}

/// Drop the request URL so transport errors stay safe to log
fn redact(e: reqwest::Error) -> PageChatError {
    PageChatError::Http(e.without_url())
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "does", "do", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "say", "says", "that", "the", "this", "to", "was", "what",
    "when", "where", "which", "who", "why", "with", "about",
];

/// Offline feature-hashing embedder.
///
/// Each non-stopword token adds a signed unit to one hashed dimension, so texts
/// sharing vocabulary point the same way. No network, fully deterministic.
pub struct HashingEmbedding {
    dim: usize,
}

impl HashingEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn vectorize(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.len() < 2 || STOPWORDS.contains(&token) {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let slot = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.vectorize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[test]
    fn test_hashing_is_deterministic() {
        let e = HashingEmbedding::new(768);
        assert_eq!(e.vectorize("pricing tiers"), e.vectorize("pricing tiers"));
        assert_eq!(e.vectorize("x").len(), 768);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let e = HashingEmbedding::new(768);
        let query = e.vectorize("What does the author say about pricing?");
        let pricing = e.vectorize("Our pricing starts at ten dollars. Pricing scales per seat.");
        let weather = e.vectorize("Tomorrow brings rain over the northern valleys.");
        assert!(cosine_similarity(&query, &pricing) > 0.15);
        assert!(cosine_similarity(&query, &weather) < cosine_similarity(&query, &pricing));
    }

    #[test]
    fn test_stopwords_only_gives_zero_vector() {
        let e = HashingEmbedding::new(16);
        assert!(crate::embeddings::is_zero(&e.vectorize("what is the")));
    }

    #[tokio::test]
    async fn test_failed_request_does_not_leak_key() {
        // Nothing listens on port 1, so the send itself fails
        let gemini =
            GeminiEmbedding::new("SECRETKEY123", "http://127.0.0.1:1", "text-embedding-004");
        let err = gemini.embed("hello").await.unwrap_err();
        assert!(matches!(err, PageChatError::Http(_)));
        let shown = format!("{} {:?}", err, err);
        assert!(!shown.contains("SECRETKEY123"));
        assert!(!shown.contains("127.0.0.1:1/models"));
    }

    #[test]
    fn test_gemini_from_config_requires_key() {
        let config = Config {
            api_key: None,
            endpoint: crate::config::DEFAULT_ENDPOINT.into(),
            embed_model: crate::config::DEFAULT_EMBED_MODEL.into(),
            settings_path: std::path::PathBuf::from("/nonexistent"),
            rag: crate::config::RagConfig::default(),
        };
        assert!(matches!(
            GeminiEmbedding::from_config(&config),
            Err(PageChatError::MissingApiKey)
        ));
    }
}

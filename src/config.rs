use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PageChatError, Result};
use crate::settings::{FileSettingsStore, SettingsStore};

/// Gemini text-embedding-004 output size
pub const EMBEDDING_DIM: usize = 768;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

/// Every hand-tuned knob of the extraction / retrieval pipeline.
///
/// The defaults mirror what the browser extension shipped with; none of them
/// has a derivation beyond "worked well on typical pages", so they stay
/// overridable instead of being baked into the algorithms.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Highest-priority chunks kept per page
    pub max_chunks: usize,
    /// Chunks shorter than this (chars) are dropped as noise
    pub min_chunk_len: usize,
    /// Sections longer than this get split into paragraph groups
    pub section_split_threshold: usize,
    /// Packing target for paragraph groups
    pub target_chunk_len: usize,
    /// Search results scoring below this are discarded
    pub similarity_threshold: f32,
    /// Chunks requested per routed question
    pub top_k: usize,

    pub cache_capacity: usize,
    pub cache_ttl: Duration,

    /// Content budget before RAG is ready
    pub full_content_budget: usize,
    /// Content budget once RAG supplies targeted chunks
    pub compact_content_budget: usize,

    pub embedding_dim: usize,
    /// Characters of a single text sent to the embedding service
    pub embedding_input_cap: usize,
    pub single_timeout: Duration,
    pub batch_timeout: Duration,
    /// Delay between request starts inside one sub-batch
    pub stagger_delay: Duration,
    /// Base pause between sub-batches, grows with each sub-batch
    pub sub_batch_delay: Duration,
    pub max_sub_batch_delay: Duration,
    /// Wait before re-initializing RAG after the page becomes visible again
    pub reinit_delay: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_chunks: 10,
            min_chunk_len: 50,
            section_split_threshold: 1500,
            target_chunk_len: 1200,
            similarity_threshold: 0.15,
            top_k: 3,
            cache_capacity: 10,
            cache_ttl: Duration::from_secs(30 * 60),
            full_content_budget: 12_000,
            compact_content_budget: 6_000,
            embedding_dim: EMBEDDING_DIM,
            embedding_input_cap: 2048,
            single_timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(30),
            stagger_delay: Duration::from_millis(100),
            sub_batch_delay: Duration::from_millis(250),
            max_sub_batch_delay: Duration::from_millis(1500),
            reinit_delay: Duration::from_millis(500),
        }
    }
}

impl RagConfig {
    /// Same thresholds, no artificial pauses. Handy for tests and local backends.
    pub fn without_delays() -> Self {
        Self {
            stagger_delay: Duration::ZERO,
            sub_batch_delay: Duration::ZERO,
            max_sub_batch_delay: Duration::ZERO,
            reinit_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key, if one could be resolved
    pub api_key: Option<String>,
    pub endpoint: String,
    pub embed_model: String,
    /// Where the settings JSON lives
    pub settings_path: PathBuf,
    pub rag: RagConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let settings_path = FileSettingsStore::default_path()?;
        Self::load_from(settings_path)
    }

    /// Resolve credentials with precedence: env var > settings file.
    pub fn load_from(settings_path: PathBuf) -> Result<Self> {
        let stored_key = FileSettingsStore::new(settings_path.clone())
            .get()
            .ok()
            .and_then(|s| s.api_key)
            .filter(|k| !k.trim().is_empty());

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or(stored_key);

        let endpoint =
            std::env::var("PAGECHAT_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let embed_model = std::env::var("PAGECHAT_EMBED_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());

        Ok(Config {
            api_key,
            endpoint,
            embed_model,
            settings_path,
            rag: RagConfig::default(),
        })
    }

    /// Fail before any network call when no credential is configured.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(PageChatError::MissingApiKey)
    }
}

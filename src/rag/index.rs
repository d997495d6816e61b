use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::chunker::{chunk_content, Chunk, ChunkerConfig};
use crate::config::RagConfig;
use crate::embeddings::{cosine_similarity, is_zero, Embedding, EmbeddingClient};
use crate::error::{PageChatError, Result};
use crate::extractor::PageContent;

/// A search hit: 1-based rank plus the similarity that earned it
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScoredChunk {
    pub rank: usize,
    pub similarity: f32,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Chunks embedded and committed by this call
    Initialized,
    /// Same content was already indexed
    AlreadyInitialized,
    /// Same content is being indexed by another call; this one was ignored
    InProgress,
}

/// Chunks and their vectors, committed together so they can't drift apart
struct Snapshot {
    chunks: Vec<Chunk>,
    embeddings: Vec<Embedding>,
}

struct IndexState {
    ready: Option<Arc<Snapshot>>,
    initializing: bool,
    /// Content the current or in-flight snapshot belongs to
    fingerprint: Option<String>,
    /// Bumped by every initialize/cleanup; stale runs compare against it
    generation: u64,
    cancel: CancellationToken,
}

/// In-memory vector index over one page's chunks.
///
/// A linear cosine scan over at most a handful of chunks; an ANN structure
/// would only add build cost at this size. Cloning shares the same index.
#[derive(Clone)]
pub struct RagIndex {
    state: Arc<Mutex<IndexState>>,
    embedder: EmbeddingClient,
    chunker: ChunkerConfig,
    threshold: f32,
}

impl RagIndex {
    pub fn new(embedder: EmbeddingClient, config: &RagConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(IndexState {
                ready: None,
                initializing: false,
                fingerprint: None,
                generation: 0,
                cancel: CancellationToken::new(),
            })),
            embedder,
            chunker: ChunkerConfig::from(config),
            threshold: config.similarity_threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        // Nothing in here can be left half-written by a panic
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().ready.is_some()
    }

    pub fn is_initializing(&self) -> bool {
        self.lock().initializing
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.lock()
            .ready
            .as_ref()
            .map(|s| s.chunks.clone())
            .unwrap_or_default()
    }

    /// Committed vectors, aligned with `chunks()`
    pub fn embeddings(&self) -> Option<Vec<Embedding>> {
        self.lock().ready.as_ref().map(|s| s.embeddings.clone())
    }

    /// Chunk and embed `content`, then commit.
    ///
    /// A call for content that is already indexed or already being indexed is
    /// a no-op. Any other call first cancels the run in flight, which then
    /// settles as `Err(Cancelled)`. Fails when no chunk could be embedded.
    pub async fn initialize(&self, content: &PageContent) -> Result<InitOutcome> {
        let fingerprint = fingerprint(&content.raw_text);

        let (generation, cancel) = {
            let mut state = self.lock();
            if state.fingerprint.as_deref() == Some(fingerprint.as_str()) {
                if state.initializing {
                    log::debug!("RAG initialization already running for {}", content.url);
                    return Ok(InitOutcome::InProgress);
                }
                if state.ready.is_some() {
                    return Ok(InitOutcome::AlreadyInitialized);
                }
            }

            state.cancel.cancel();
            state.cancel = CancellationToken::new();
            state.generation += 1;
            state.ready = None;
            state.initializing = true;
            state.fingerprint = Some(fingerprint);
            (state.generation, state.cancel.clone())
        };

        let chunks = chunk_content(&content.raw_text, &self.chunker);
        if chunks.is_empty() {
            self.abandon(generation);
            return Err(PageChatError::NoChunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = match self.embedder.embed_batch(&texts, &cancel).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                // Whoever cancelled us owns the state now
                log::debug!("RAG initialization for {} abandoned: {}", content.url, e);
                return Err(e);
            }
        };

        if embeddings.iter().all(|e| is_zero(e)) {
            self.abandon(generation);
            return Err(PageChatError::Embedding(
                "no chunk could be embedded".into(),
            ));
        }

        let mut state = self.lock();
        if state.generation != generation || cancel.is_cancelled() {
            return Err(PageChatError::Cancelled);
        }
        let degraded = embeddings.iter().filter(|e| is_zero(e)).count();
        state.ready = Some(Arc::new(Snapshot { chunks, embeddings }));
        state.initializing = false;
        log::info!(
            "RAG index ready for {}: {} chunks ({} degraded)",
            content.url,
            state.ready.as_ref().map(|s| s.chunks.len()).unwrap_or(0),
            degraded
        );
        Ok(InitOutcome::Initialized)
    }

    /// Reinstate vectors computed earlier for the same content, e.g. from the
    /// content cache. Returns false if they no longer line up with the chunks.
    pub fn restore(&self, content: &PageContent, embeddings: Vec<Embedding>) -> bool {
        let chunks = chunk_content(&content.raw_text, &self.chunker);
        if chunks.is_empty()
            || chunks.len() != embeddings.len()
            || embeddings.iter().any(|e| e.len() != self.embedder.dim())
        {
            return false;
        }

        let mut state = self.lock();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.generation += 1;
        state.ready = Some(Arc::new(Snapshot { chunks, embeddings }));
        state.initializing = false;
        state.fingerprint = Some(fingerprint(&content.raw_text));
        log::debug!("RAG index restored from cache for {}", content.url);
        true
    }

    /// Top `top_k` chunks for `query` at or above the similarity threshold.
    ///
    /// Never fails: an uninitialized index, an empty query, a failed query
    /// embedding or a reset mid-search all yield an empty result.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let (snapshot, cancel) = {
            let state = self.lock();
            match state.ready.as_ref() {
                Some(snapshot) => (Arc::clone(snapshot), state.cancel.clone()),
                None => return Vec::new(),
            }
        };

        let query_embedding = match self.embedder.embed(query, &cancel).await {
            Ok(embedding) => embedding,
            Err(_) => return Vec::new(),
        };
        if cancel.is_cancelled() {
            return Vec::new();
        }

        rank(
            &snapshot.chunks,
            &snapshot.embeddings,
            &query_embedding,
            top_k,
            self.threshold,
        )
    }

    /// Cancel in-flight work and drop all state. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let mut state = self.lock();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.generation += 1;
        state.ready = None;
        state.initializing = false;
        state.fingerprint = None;
    }

    fn abandon(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation {
            state.initializing = false;
            state.fingerprint = None;
        }
    }
}

/// Rank by descending similarity (ties keep chunk order), cut to `top_k`,
/// then drop anything under `threshold`.
pub fn rank(
    chunks: &[Chunk],
    embeddings: &[Embedding],
    query: &[f32],
    top_k: usize,
    threshold: f32,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query, e)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(top_k)
        .filter(|(_, similarity)| *similarity >= threshold)
        .enumerate()
        .map(|(pos, (i, similarity))| ScoredChunk {
            rank: pos + 1,
            similarity,
            chunk: chunks[i].clone(),
        })
        .collect()
}

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

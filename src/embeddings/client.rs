use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use super::{zero_embedding, Embedding, EmbeddingService};
use crate::config::RagConfig;
use crate::error::{PageChatError, Result};
use crate::text::truncate_chars;

/// Rate-limited, cancellable front end to an `EmbeddingService`.
///
/// Failures and timeouts resolve to a zero vector so a single bad request can't
/// take down a whole page index. The only error these methods return is
/// `PageChatError::Cancelled`.
#[derive(Clone)]
pub struct EmbeddingClient {
    service: Arc<dyn EmbeddingService>,
    dim: usize,
    input_cap: usize,
    single_timeout: Duration,
    batch_timeout: Duration,
    stagger_delay: Duration,
    sub_batch_delay: Duration,
    max_sub_batch_delay: Duration,
}

impl EmbeddingClient {
    pub fn new(service: Arc<dyn EmbeddingService>, config: &RagConfig) -> Self {
        Self {
            service,
            dim: config.embedding_dim,
            input_cap: config.embedding_input_cap,
            single_timeout: config.single_timeout,
            batch_timeout: config.batch_timeout,
            stagger_delay: config.stagger_delay,
            sub_batch_delay: config.sub_batch_delay,
            max_sub_batch_delay: config.max_sub_batch_delay,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed one text (query path)
    pub async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Embedding> {
        self.request(text, self.single_timeout, cancel).await
    }

    /// Embed many texts, results aligned with `texts`.
    ///
    /// Sub-batches run strictly in order; inside one sub-batch the requests
    /// start `stagger_delay` apart and are joined back in input order.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let size = sub_batch_size(texts);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_idx, group) in texts.chunks(size).enumerate() {
            if batch_idx > 0 {
                self.pause(self.sub_batch_pause(batch_idx), cancel).await?;
            }

            let requests = group.iter().enumerate().map(|(i, text)| async move {
                if i > 0 {
                    self.pause(self.stagger_delay * i as u32, cancel).await?;
                }
                self.request(text, self.batch_timeout, cancel).await
            });

            for result in join_all(requests).await {
                embeddings.push(result?);
            }
        }

        log::debug!(
            "embedded {} texts in sub-batches of {}",
            embeddings.len(),
            size
        );
        Ok(embeddings)
    }

    async fn request(
        &self,
        text: &str,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> Result<Embedding> {
        if cancel.is_cancelled() {
            return Err(PageChatError::Cancelled);
        }
        if text.trim().is_empty() {
            return Ok(zero_embedding(self.dim));
        }

        let text = truncate_chars(text, self.input_cap);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PageChatError::Cancelled),
            res = tokio::time::timeout(limit, self.service.embed(text)) => res,
        };

        // A reset may have landed while the response was in flight
        if cancel.is_cancelled() {
            return Err(PageChatError::Cancelled);
        }

        match outcome {
            Ok(Ok(vector)) if vector.len() == self.dim => Ok(vector),
            Ok(Ok(vector)) => {
                log::warn!(
                    "embedding has {} dimensions, expected {}; using zero vector",
                    vector.len(),
                    self.dim
                );
                Ok(zero_embedding(self.dim))
            }
            Ok(Err(e)) if e.is_cancelled() => Err(PageChatError::Cancelled),
            Ok(Err(e)) => {
                log::warn!("embedding request failed: {}; using zero vector", e);
                Ok(zero_embedding(self.dim))
            }
            Err(_) => {
                log::warn!(
                    "embedding request timed out after {} ms; using zero vector",
                    limit.as_millis()
                );
                Ok(zero_embedding(self.dim))
            }
        }
    }

    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> Result<()> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(PageChatError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Grows with each sub-batch, capped
    fn sub_batch_pause(&self, batch_idx: usize) -> Duration {
        (self.sub_batch_delay * batch_idx as u32).min(self.max_sub_batch_delay)
    }
}

/// Longer texts get smaller sub-batches.
fn sub_batch_size(texts: &[String]) -> usize {
    let total: usize = texts.iter().map(|t| t.chars().count()).sum();
    let average = total / texts.len().max(1);
    if average > 1000 {
        2
    } else if average > 400 {
        3
    } else {
        5
    }
}

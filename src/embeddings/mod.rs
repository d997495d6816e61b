pub mod client;
pub mod provider;

pub use client::EmbeddingClient;
pub use provider::{EmbeddingService, GeminiEmbedding, HashingEmbedding};

/// Fixed-length vector for one chunk or query
pub type Embedding = Vec<f32>;

/// Fallback for failed requests; scores 0 against everything.
pub fn zero_embedding(dim: usize) -> Embedding {
    vec![0.0; dim]
}

pub fn is_zero(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| *x == 0.0)
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

pub mod chunker;
pub mod index;

pub use chunker::{chunk_content, Chunk, ChunkKind, ChunkerConfig};
pub use index::{InitOutcome, RagIndex, ScoredChunk};

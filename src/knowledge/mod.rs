//! Document knowledge for grounded answers
//!
//! - **extract**: Turn uploaded bytes into plain text
//! - **chunking**: Split text into overlapping windows
//! - **embedder**: Vectorize chunks and queries
//! - **retrieval**: Rank chunks by cosine similarity
//! - **store**: Own documents, chunks and vectors

mod chunking;
mod embedder;
mod extract;
mod retrieval;
mod store;

pub use chunking::{ChunkingConfig, TextSpan, split_text};
pub use embedder::{Embedder, HASH_EMBEDDING_DIM, HashEmbedder, OpenAiEmbedder};
pub use extract::{
    AnyDocumentExtractor, DEFAULT_MAX_DOCUMENT_BYTES, DocumentExtractor, ExtractError,
    PdfExtractor, PlainTextExtractor,
};
pub use retrieval::{cosine_similarity, rank};
pub use store::{
    Chunk, ChunkStore, DocumentSummary, KnowledgeDocument, RetrievalResult, ScoredChunk,
};

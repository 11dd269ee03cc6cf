//! In-memory document and chunk store
//!
//! Documents are chunked and embedded before the write lock is taken, so a
//! reader sees either the whole document or none of it. Removal drops the
//! document together with its chunks and vectors in one critical section.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::chunking::{ChunkingConfig, split_text};
use super::embedder::Embedder;
use super::retrieval::rank;
use crate::{Error, Result};

/// A retrievable slice of a document's extracted text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Position within the document
    pub index: usize,
    /// Start offset in characters, inclusive
    pub start: usize,
    /// End offset in characters, exclusive
    pub end: usize,
    pub text: String,
    #[serde(skip)]
    pub vector: Option<Vec<f32>>,
}

/// A document owned by the store
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: usize,
    pub chunks: Vec<Chunk>,
    pub created_at: DateTime<Utc>,
}

/// Listing entry for a stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&KnowledgeDocument> for DocumentSummary {
    fn from(doc: &KnowledgeDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            size_bytes: doc.size_bytes,
            chunk_count: doc.chunks.len(),
            created_at: doc.created_at,
        }
    }
}

/// A chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks judged relevant to a query, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Chunk texts in rank order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk.text.as_str()).collect()
    }

    /// Chunk texts joined by a blank line, `None` when nothing was found
    #[must_use]
    pub fn context(&self) -> Option<String> {
        if self.chunks.is_empty() {
            None
        } else {
            Some(self.texts().join("\n\n"))
        }
    }
}

/// Owns ingested documents and answers similarity queries
pub struct ChunkStore {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    documents: RwLock<Vec<KnowledgeDocument>>,
}

impl ChunkStore {
    /// Create an empty store
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            documents: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<KnowledgeDocument>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<KnowledgeDocument>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Chunk, embed and store extracted document text
    ///
    /// # Errors
    ///
    /// Returns error if embedding fails; nothing is stored in that case
    pub async fn ingest(
        &self,
        name: &str,
        size_bytes: usize,
        text: &str,
    ) -> Result<DocumentSummary> {
        let spans = split_text(text, self.chunking);
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();

        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != spans.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} vectors for {} chunks",
                self.embedder.name(),
                vectors.len(),
                spans.len()
            )));
        }

        let document_id = Uuid::new_v4();
        let chunks = spans
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (span, vector))| Chunk {
                id: Uuid::new_v4(),
                document_id,
                index,
                start: span.start,
                end: span.end,
                text: span.text,
                vector: Some(vector),
            })
            .collect();

        let document = KnowledgeDocument {
            id: document_id,
            name: name.to_string(),
            size_bytes,
            chunks,
            created_at: Utc::now(),
        };
        let summary = DocumentSummary::from(&document);

        self.write().push(document);

        tracing::info!(
            document = %summary.id,
            name = %summary.name,
            chunks = summary.chunk_count,
            embedder = self.embedder.name(),
            "document ingested"
        );
        Ok(summary)
    }

    /// List stored documents in insertion order
    #[must_use]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.read().iter().map(DocumentSummary::from).collect()
    }

    /// Fetch a full document
    #[must_use]
    pub fn document(&self, id: Uuid) -> Option<KnowledgeDocument> {
        self.read().iter().find(|d| d.id == id).cloned()
    }

    /// Remove a document with all its chunks and vectors
    ///
    /// Returns false if no such document exists
    pub fn remove(&self, id: Uuid) -> bool {
        let mut documents = self.write();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        let removed = documents.len() != before;
        drop(documents);

        if removed {
            tracing::info!(document = %id, "document removed");
        }
        removed
    }

    /// Total number of stored chunks
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.read().iter().map(|d| d.chunks.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }

    /// Return at most `top_k` chunks ranked by cosine similarity to `query`
    ///
    /// Ties keep insertion order. `top_k == 0` or an empty store returns an
    /// empty result without calling the embedder.
    ///
    /// # Errors
    ///
    /// Returns error if the query cannot be embedded
    pub async fn search(&self, query: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 || self.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_vector = self
            .embedder
            .embed(&[query])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))?;

        let documents = self.read();
        let candidates = documents
            .iter()
            .flat_map(|d| d.chunks.iter())
            .map(|c| (c, c.vector.as_deref()));

        let chunks: Vec<ScoredChunk> = rank(&query_vector, candidates, top_k)
            .into_iter()
            .map(|(chunk, score)| ScoredChunk {
                chunk: Chunk {
                    vector: None,
                    ..chunk.clone()
                },
                score,
            })
            .collect();
        drop(documents);

        tracing::debug!(top_k, found = chunks.len(), "retrieval complete");
        Ok(RetrievalResult { chunks })
    }
}

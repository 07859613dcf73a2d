use crate::chunking::{chunk_pages, ChunkingConfig};
use crate::error::{ChatError, SearchError};
use crate::extractor::PdfExtractor;
use crate::index::ChunkIndex;
use crate::loader::load_documents;
use crate::models::{PdfDocument, RetrievedChunk, SkippedPdf};
use crate::traits::Embedder;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct RetrieverOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub embedding_batch_size: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            embedding_batch_size: 512,
        }
    }
}

pub struct Retriever {
    index: ChunkIndex,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    documents: Vec<PdfDocument>,
    skipped: Vec<SkippedPdf>,
}

impl Retriever {
    /// Loads, chunks, embeds and indexes `paths`.
    pub async fn build(
        paths: &[PathBuf],
        embedder: Arc<dyn Embedder>,
        extractor: &dyn PdfExtractor,
        options: RetrieverOptions,
    ) -> Result<Self, ChatError> {
        let report = load_documents(paths, extractor)?;
        let chunks = chunk_pages(&report.pages, options.chunking)?;
        let index = ChunkIndex::build(chunks, embedder.as_ref(), options.embedding_batch_size)
            .await?;

        Ok(Self {
            index,
            embedder,
            top_k: options.top_k.max(1),
            documents: report.documents,
            skipped: report.skipped,
        })
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(query).await?;
        self.index.search(&query_vector, self.top_k)
    }

    pub fn documents(&self) -> &[PdfDocument] {
        &self.documents
    }

    pub fn skipped(&self) -> &[SkippedPdf] {
        &self.skipped
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

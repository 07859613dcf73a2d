use crate::error::SearchError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::Embedder;
use tracing::info;

#[derive(Debug, Clone)]
struct IndexEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Flat, immutable vector index over chunks. Search is exact and ranks by
/// squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl ChunkIndex {
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, SearchError> {
        if chunks.is_empty() {
            return Err(SearchError::EmptyIndex);
        }
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(SearchError::Request("embeddings are empty".to_string()));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(SearchError::DimensionMismatch {
                        expected: dimensions,
                        found: vector.len(),
                    });
                }
                Ok(IndexEntry { vector, chunk })
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Embeds every chunk in batches of `batch_size` and indexes the result.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, SearchError> {
        if chunks.is_empty() {
            return Err(SearchError::EmptyIndex);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let vectors = embedder.embed_documents(batch).await?;
            if vectors.len() != batch.len() {
                return Err(SearchError::Request(format!(
                    "{} returned {} vectors for {} inputs",
                    embedder.model_id(),
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }

        let index = Self::from_embeddings(chunks, embeddings)?;
        info!(
            chunks = index.len(),
            dimensions = index.dimensions,
            model = embedder.model_id(),
            "built chunk index"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// Returns the `top_k` nearest chunks. Equal distances keep index order.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        if query_vector.len() != self.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions,
                found: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, squared_l2(&entry.vector, query_vector)))
            .collect();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (position, distance))| RetrievedChunk {
                rank,
                distance,
                chunk: self.entries[position].chunk.clone(),
            })
            .collect())
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

use crate::error::IngestError;
use crate::models::{Chunk, PageUnit};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1_000,
            overlap_chars: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `text` into windows of at most `max_chars` characters. Each window
/// after the first starts exactly `overlap_chars` characters before the end of
/// the previous one. Window ends snap back to whitespace when the window still
/// reaches past the previous end.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|ch| ch.is_whitespace()) {
        return Ok(Vec::new());
    }
    if chars.len() <= config.max_chars {
        return Ok(vec![text.to_string()]);
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + config.max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            // start + overlap + 1 is always past the previous window's end
            let lowest = start + config.overlap_chars + 1;
            (lowest..=hard_end)
                .rev()
                .find(|&candidate| chars[candidate - 1].is_whitespace())
                .unwrap_or(hard_end)
        };

        pieces.push(chars[start..end].iter().collect::<String>());

        if end == chars.len() {
            break;
        }
        start = end - config.overlap_chars;
    }

    Ok(pieces)
}

/// Chunks every page in order. Chunk indices run across all pages so each
/// chunk has a stable position in the corpus.
pub fn chunk_pages(pages: &[PageUnit], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        let normalized = normalize_whitespace(&page.text);
        for piece in split_text(&normalized, config)? {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(&page.source, page.page, cursor, &piece),
                source: page.source.clone(),
                source_path: page.source_path.clone(),
                page: page.page,
                chunk_index: cursor,
                text: piece,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok(chunks)
}

fn make_chunk_id(source: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

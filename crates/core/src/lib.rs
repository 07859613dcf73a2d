pub mod cache;
pub mod chunking;
pub mod composer;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod loader;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod retriever;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use cache::{CacheKey, RetrieverCache};
pub use chunking::{chunk_pages, normalize_whitespace, split_text, ChunkingConfig};
pub use composer::{default_template, AnswerComposer, PromptTemplate, DEFAULT_REFUSAL};
pub use config::{resolve_credential, ChatConfig, EmbeddingBackend, API_KEY_ENV};
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ChatError, ConfigError, IngestError, RemoteError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use index::ChunkIndex;
pub use loader::{digest_file, discover_pdf_files, load_documents, LoadReport};
pub use models::{
    Answer, Chunk, Credential, PageUnit, PdfDocument, RetrievedChunk, Role, SkippedPdf,
    SourceSet, Turn,
};
pub use orchestrator::ChatCoordinator;
pub use providers::{OpenAiChatModel, OpenAiEmbedder, OpenAiProvider};
pub use retriever::{Retriever, RetrieverOptions, DEFAULT_TOP_K};
pub use session::{ChatSession, Transcript};
pub use traits::{ChatModel, Embedder, ModelProvider, TokenStream};

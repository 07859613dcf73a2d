//! Settings for the chat pipeline.
//!
//! Built-in defaults are merged with an optional TOML file and then with
//! `PDFCHAT_*` environment variables, in that order.

use crate::chunking::ChunkingConfig;
use crate::composer::{default_template, AnswerComposer, PromptTemplate, DEFAULT_REFUSAL};
use crate::error::ConfigError;
use crate::models::Credential;
use crate::retriever::{RetrieverOptions, DEFAULT_TOP_K};
use figment::{
    error::Kind,
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "PDFCHAT_";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAi,
    Ngram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub data_dir: PathBuf,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub top_k: usize,
    pub api_base: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub chat_model: String,
    pub streaming: bool,
    pub refusal: String,
    pub prompt_template: Option<String>,
    pub credential_key: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let chunking = ChunkingConfig::default();
        Self {
            data_dir: PathBuf::from("data"),
            chunk_max_chars: chunking.max_chars,
            chunk_overlap_chars: chunking.overlap_chars,
            top_k: DEFAULT_TOP_K,
            api_base: "https://api.openai.com/v1".to_string(),
            embedding_backend: EmbeddingBackend::OpenAi,
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_batch_size: 512,
            chat_model: "gpt-4o-mini".to_string(),
            streaming: true,
            refusal: DEFAULT_REFUSAL.to_string(),
            prompt_template: None,
            credential_key: "OpenAI_key".to_string(),
        }
    }
}

impl ChatConfig {
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ChatConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::figment(path).extract()?)
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: self.chunk_max_chars,
            overlap_chars: self.chunk_overlap_chars,
        }
    }

    pub fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions {
            chunking: self.chunking(),
            top_k: self.top_k,
            embedding_batch_size: self.embedding_batch_size,
        }
    }

    pub fn composer(&self) -> Result<AnswerComposer, ConfigError> {
        let template = match &self.prompt_template {
            Some(custom) => PromptTemplate::new(custom.clone())?,
            None => PromptTemplate::new(default_template(&self.refusal))?,
        };
        Ok(AnswerComposer::new(
            template,
            self.refusal.clone(),
            self.streaming,
        ))
    }
}

/// Picks the API credential: an explicit value wins, otherwise `key` is read
/// from the secrets file. Blank values count as missing.
pub fn resolve_credential(
    explicit: Option<&str>,
    secrets_file: &Path,
    key: &str,
) -> Result<Credential, ConfigError> {
    if let Some(value) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(Credential::new(value));
    }

    let from_file = match Figment::from(Toml::file(secrets_file)).extract_inner::<String>(key) {
        Ok(value) => Some(value.trim().to_string()).filter(|value| !value.is_empty()),
        Err(error) if matches!(error.kind, Kind::MissingField(_)) => None,
        Err(error) => return Err(error.into()),
    };

    from_file
        .map(Credential::new)
        .ok_or_else(|| ConfigError::MissingCredential(key.to_string()))
}

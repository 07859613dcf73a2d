use crate::config::{ChatConfig, EmbeddingBackend};
use crate::embeddings::CharacterNgramEmbedder;
use crate::error::RemoteError;
use crate::models::Credential;
use crate::traits::{ChatModel, Embedder, ModelProvider, TokenStream};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

const BACKEND: &str = "openai";

fn endpoint(base: &str, path: &str) -> Result<Url, RemoteError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path)?)
}

async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    })
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

fn order_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RemoteError> {
    if response.data.len() != expected {
        return Err(RemoteError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            ),
        });
    }
    response.data.sort_by_key(|item| item.index);
    Ok(response
        .data
        .into_iter()
        .map(|item| item.embedding)
        .collect())
}

pub struct OpenAiEmbedder {
    client: Client,
    api_base: String,
    model: String,
    credential: Credential,
}

impl OpenAiEmbedder {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        model: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            credential,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(endpoint(&self.api_base, "embeddings")?)
            .bearer_auth(self.credential.expose())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let parsed: EmbeddingResponse = ensure_success(response).await?.json().await?;
        order_embeddings(parsed, texts.len())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RemoteError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| RemoteError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "no embedding returned for query".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SseFrame {
    Delta(String),
    Done,
}

/// Splits a server-sent-event byte stream into completion deltas. Bytes are
/// buffered until a full line is available so multi-byte characters split
/// across network reads stay intact.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseFrame>, RemoteError> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = parse_line(line.trim())? {
                frames.push(frame);
            }
        }

        Ok(frames)
    }

    /// Flushes a trailing line that arrived without a newline.
    pub(crate) fn finish(&mut self) -> Result<Vec<SseFrame>, RemoteError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        Ok(parse_line(line.trim())?.into_iter().collect())
    }
}

fn parse_line(line: &str) -> Result<Option<SseFrame>, RemoteError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseFrame::Done));
    }

    let chunk: ChatChunk = serde_json::from_str(data)?;
    let content = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect::<String>();

    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(SseFrame::Delta(content)))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

async fn next_fragment(
    mut state: StreamState,
) -> Result<Option<(String, StreamState)>, RemoteError> {
    loop {
        if let Some(fragment) = state.pending.pop_front() {
            return Ok(Some((fragment, state)));
        }
        if state.finished {
            return Ok(None);
        }

        let frames = match state.bytes.next().await {
            Some(chunk) => state.decoder.push(&chunk?)?,
            None => {
                state.finished = true;
                state.decoder.finish()?
            }
        };

        for frame in frames {
            match frame {
                SseFrame::Delta(text) => state.pending.push_back(text),
                SseFrame::Done => {
                    state.finished = true;
                    break;
                }
            }
        }
    }
}

fn token_stream(response: Response) -> TokenStream {
    let state = StreamState {
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::try_unfold(state, next_fragment).boxed()
}

pub struct OpenAiChatModel {
    client: Client,
    api_base: String,
    model: String,
    credential: Credential,
}

impl OpenAiChatModel {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        model: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
            credential,
        }
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<Response, RemoteError> {
        let response = self
            .client
            .post(endpoint(&self.api_base, "chat/completions")?)
            .bearer_auth(self.credential.expose())
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                stream,
            })
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        let parsed: ChatResponse = self.send(prompt, false).await?.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RemoteError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "completion had no content".to_string(),
            })
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RemoteError> {
        let response = self.send(prompt, true).await?;
        Ok(token_stream(response))
    }
}

/// Builds OpenAI-compatible clients from [`ChatConfig`]. One HTTP client is
/// shared by everything it hands out.
pub struct OpenAiProvider {
    client: Client,
    api_base: String,
    embedding_backend: EmbeddingBackend,
    embedding_model: String,
    chat_model: String,
}

impl OpenAiProvider {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            embedding_backend: config.embedding_backend,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
        }
    }
}

impl ModelProvider for OpenAiProvider {
    fn embedder(&self, credential: &Credential) -> Arc<dyn Embedder> {
        match self.embedding_backend {
            EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(
                self.client.clone(),
                self.api_base.clone(),
                self.embedding_model.clone(),
                credential.clone(),
            )),
            EmbeddingBackend::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        }
    }

    fn chat_model(&self, credential: &Credential) -> Arc<dyn ChatModel> {
        Arc::new(OpenAiChatModel::new(
            self.client.clone(),
            self.api_base.clone(),
            self.chat_model.clone(),
            credential.clone(),
        ))
    }
}

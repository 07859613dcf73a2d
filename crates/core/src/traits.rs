use crate::error::RemoteError;
use crate::models::Credential;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Incremental text fragments from a generation call.
pub type TokenStream = BoxStream<'static, Result<String, RemoteError>>;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RemoteError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError>;

    async fn stream(&self, prompt: &str) -> Result<TokenStream, RemoteError>;
}

/// Hands out model clients bound to a credential.
pub trait ModelProvider: Send + Sync {
    fn embedder(&self, credential: &Credential) -> Arc<dyn Embedder>;

    fn chat_model(&self, credential: &Credential) -> Arc<dyn ChatModel>;
}

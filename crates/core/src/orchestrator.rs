use crate::cache::RetrieverCache;
use crate::composer::AnswerComposer;
use crate::error::ChatError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{Answer, SourceSet};
use crate::retriever::{Retriever, RetrieverOptions};
use crate::session::ChatSession;
use crate::traits::ModelProvider;
use std::sync::Arc;
use tracing::info;

/// Long-lived turn handler. Retrievers are cached across sessions; every
/// session brings its own transcript.
pub struct ChatCoordinator<P>
where
    P: ModelProvider,
{
    provider: P,
    cache: RetrieverCache,
    composer: AnswerComposer,
    extractor: Arc<dyn PdfExtractor>,
    options: RetrieverOptions,
}

impl<P> ChatCoordinator<P>
where
    P: ModelProvider,
{
    pub fn new(provider: P, composer: AnswerComposer, options: RetrieverOptions) -> Self {
        Self {
            provider,
            cache: RetrieverCache::new(),
            composer,
            extractor: Arc::new(LopdfExtractor),
            options,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    pub fn cached_retrievers(&self) -> usize {
        self.cache.len()
    }

    /// Returns the retriever for `sources`, building it on first use.
    pub async fn retriever(&self, sources: &SourceSet) -> Result<Arc<Retriever>, ChatError> {
        self.cache
            .get_or_build(sources, move || async move {
                info!(files = ?sources.file_names(), "building retriever");
                let embedder = self.provider.embedder(sources.credential());
                Retriever::build(
                    sources.paths(),
                    embedder,
                    self.extractor.as_ref(),
                    self.options,
                )
                .await
            })
            .await
    }

    /// Handles one incoming message. The transcript only changes when the
    /// whole turn succeeds.
    pub async fn handle_turn<F>(
        &self,
        session: &mut ChatSession,
        sources: &SourceSet,
        question: &str,
        on_token: F,
    ) -> Result<Answer, ChatError>
    where
        F: FnMut(&str),
    {
        let retriever = self.retriever(sources).await?;
        let hits = retriever.retrieve(question).await?;
        let model = self.provider.chat_model(sources.credential());

        let answer = self
            .composer
            .answer(model.as_ref(), &hits, question, on_token)
            .await?;

        session.record_exchange(question, &answer.text);
        info!(
            session = %session.id(),
            refused = answer.refused,
            sources = ?answer.sources,
            "answered turn"
        );
        Ok(answer)
    }
}

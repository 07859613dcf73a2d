use crate::error::{ConfigError, RemoteError};
use crate::models::{Answer, RetrievedChunk};
use crate::traits::ChatModel;
use futures::StreamExt;

pub const DEFAULT_REFUSAL: &str =
    "The requested information was not found in the provided documents.";

const CONTEXT_SLOT: &str = "{context}";
const INPUT_SLOT: &str = "{input}";

pub fn default_template(refusal: &str) -> String {
    format!(
        r#"You are an expert assistant on the documents supplied below. Your task is to analyse the provided context and answer the user's question as precisely as possible.

Follow these rules strictly:
1. Base your answer solely and exclusively on the text in the "Context".
2. Answer the user's question directly and clearly.
3. After the direct answer, if the information was found, add a "Source" section quoting the exact excerpt of the context that supports your answer.
4. If the information is not in the context at all, do not infer or guess. Reply only: "{refusal}"

Context:
{CONTEXT_SLOT}

User question: {INPUT_SLOT}
"#
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, INPUT_SLOT] {
            if !template.contains(slot) {
                return Err(ConfigError::InvalidTemplate(format!("missing {slot} slot")));
            }
        }
        Ok(Self { template })
    }

    /// Fills both slots in one pass; substituted text is never re-scanned.
    pub fn render(&self, context: &str, input: &str) -> String {
        let mut rendered = String::with_capacity(self.template.len() + context.len() + input.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                rendered.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(INPUT_SLOT) {
                rendered.push_str(input);
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

#[derive(Debug, Clone)]
pub struct AnswerComposer {
    template: PromptTemplate,
    refusal: String,
    streaming: bool,
}

impl Default for AnswerComposer {
    fn default() -> Self {
        Self {
            template: PromptTemplate {
                template: default_template(DEFAULT_REFUSAL),
            },
            refusal: DEFAULT_REFUSAL.to_string(),
            streaming: true,
        }
    }
}

impl AnswerComposer {
    pub fn new(template: PromptTemplate, refusal: impl Into<String>, streaming: bool) -> Self {
        Self {
            template,
            refusal: refusal.into(),
            streaming,
        }
    }

    pub fn refusal(&self) -> &str {
        &self.refusal
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn format_context(chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .map(|hit| {
                format!(
                    "[source: {}, page {}]\n{}",
                    hit.chunk.source, hit.chunk.page, hit.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn compose(&self, chunks: &[RetrievedChunk], question: &str) -> String {
        self.template
            .render(&Self::format_context(chunks), question)
    }

    pub fn is_refusal(&self, text: &str) -> bool {
        let trimmed = text.trim().trim_matches('"').trim();
        trimmed == self.refusal.trim()
    }

    /// Sends the composed prompt to `model`. Fragments reach `on_token` as they
    /// arrive when streaming, otherwise the whole reply is passed once.
    pub async fn answer<F>(
        &self,
        model: &dyn ChatModel,
        chunks: &[RetrievedChunk],
        question: &str,
        mut on_token: F,
    ) -> Result<Answer, RemoteError>
    where
        F: FnMut(&str),
    {
        let prompt = self.compose(chunks, question);

        let text = if self.streaming {
            let mut stream = model.stream(&prompt).await?;
            let mut collected = String::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                on_token(&fragment);
                collected.push_str(&fragment);
            }
            collected
        } else {
            let text = model.complete(&prompt).await?;
            on_token(&text);
            text
        };

        let refused = self.is_refusal(&text);
        let sources = if refused {
            Vec::new()
        } else {
            let mut sources: Vec<String> = Vec::new();
            for hit in chunks {
                if !sources.contains(&hit.chunk.source) {
                    sources.push(hit.chunk.source.clone());
                }
            }
            sources
        };

        Ok(Answer {
            text,
            refused,
            sources,
        })
    }
}

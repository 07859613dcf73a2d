pub mod openai;

pub use openai::{OpenAiChatModel, OpenAiEmbedder, OpenAiProvider};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("no pdf files found in {0}")]
    NoPdfFiles(String),

    #[error("no documents could be loaded, please check the pdf files")]
    NoDocuments,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("cannot build an index without chunks")]
    EmptyIndex,

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("credential `{0}` not found; set OPENAI_API_KEY or add it to the secrets file")]
    MissingCredential(String),

    #[error("invalid prompt template: {0}")]
    InvalidTemplate(String),

    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

/// Everything a chat turn can fail with.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

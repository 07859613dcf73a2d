use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfDocument {
    pub source_path: String,
    pub file_name: String,
    pub checksum: String,
    pub page_count: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Text of one page, tagged with the file it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageUnit {
    pub source: String,
    pub source_path: String,
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: String,
    pub source_path: String,
    pub page: u32,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub rank: usize,
    pub distance: f32,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

/// API key for the remote model service. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The input set an index is built from: a set of files plus the credential
/// used to embed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSet {
    paths: Vec<PathBuf>,
    credential: Credential,
}

impl SourceSet {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>, credential: Credential) -> Self {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();
        paths.dedup();
        Self { paths, credential }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn file_names(&self) -> Vec<String> {
        self.paths
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub refused: bool,
    pub sources: Vec<String>,
}

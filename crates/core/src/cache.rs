//! Process-wide memo table for built retrievers.
//!
//! Each distinct [`SourceSet`] maps to one cell. The first caller for a key
//! runs the build; concurrent callers for the same key wait on that build
//! instead of starting their own. A failed build leaves the cell empty.

use crate::models::SourceSet;
use crate::retriever::Retriever;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hashes the sorted paths and the credential. The secret itself is never
    /// kept in the table.
    pub fn for_sources(sources: &SourceSet) -> Self {
        let mut hasher = Sha256::new();
        for path in sources.paths() {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xffu8]);
        hasher.update(sources.credential().expose().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

type Slot = Arc<OnceCell<Arc<Retriever>>>;

#[derive(Default)]
pub struct RetrieverCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl RetrieverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build<F, Fut, E>(
        &self,
        sources: &SourceSet,
        build: F,
    ) -> Result<Arc<Retriever>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Retriever, E>>,
    {
        let key = CacheKey::for_sources(sources);
        let slot = self.slot(&key);

        if let Some(ready) = slot.get() {
            debug!(files = sources.paths().len(), "retriever cache hit");
            return Ok(Arc::clone(ready));
        }

        let retriever = slot
            .get_or_try_init(move || async move { build().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(retriever))
    }

    /// Number of keys with a finished retriever.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}

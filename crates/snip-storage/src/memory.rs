use crate::index::UrlIndex;
use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::repository::{ReadRepository, Repository, Result};
use snip_core::{DeleteBatch, NewUrl, OwnedUrls, OwnerId, Slug};
use tracing::{debug, warn};

/// In-memory implementation of the repository contract.
///
/// All indices live in one [`UrlIndex`] behind a single exclusive lock, so
/// every read and write sees a consistent view. Nothing is persisted; each
/// process owns a disjoint store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: Mutex<UrlIndex>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self {
            index: Mutex::new(UrlIndex::new()),
        }
    }

    /// Number of records ever stored, deleted ones included.
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn resolve(&self, slug: &Slug) -> Result<String> {
        self.index.lock().resolve(slug)
    }

    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        self.index.lock().reverse_resolve(owner, original_url)
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        self.index.lock().list_owned(owner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
        self.index
            .lock()
            .insert(owner, NewUrl::new(slug.clone(), original_url))?;
        debug!(owner = %owner, slug = %slug, "stored url");
        Ok(())
    }

    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
        let total = entries.len();
        let mut index = self.index.lock();

        // Best-effort: entries before the first failure stay applied.
        for (applied, entry) in entries.into_iter().enumerate() {
            if let Err(err) = index.insert(owner, entry) {
                warn!(owner = %owner, applied, total, error = %err, "batch insert stopped");
                return Err(err);
            }
        }

        debug!(owner = %owner, total, "stored url batch");
        Ok(())
    }

    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
        let report = self.index.lock().soft_delete(batch);
        debug!(marked = report.marked, "soft-deleted urls");
        report.into_result()
    }
}
